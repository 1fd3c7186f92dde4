// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;

use mecharm_core::arm::{ArmAccess, ArmDriver};
use mecharm_core::DynResult;

mod sim;

pub use sim::SimArm;

#[cfg(feature = "mycobot")]
use mecharm_backend_mycobot::MyCobotArm;

pub type BackendFactory = fn(ArmAccess) -> DynResult<Box<dyn ArmDriver>>;

/// Context for registering and instantiating arm backends.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, BackendFactory>,
}

impl RegistrationContext {
    /// Create a new empty registration context.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory under a stable name (e.g. "mycobot").
    pub fn register_backend(&mut self, name: &str, factory: BackendFactory) {
        let key = normalize_name(name);
        self.factories.insert(key, factory);
    }

    /// Check whether a backend name is registered.
    pub fn is_backend_registered(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.factories.contains_key(&key)
    }

    /// List registered backend names.
    pub fn registered_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate an arm backend based on the selected name and access
    /// method.
    pub fn build_arm(&self, name: &str, access: ArmAccess) -> DynResult<Box<dyn ArmDriver>> {
        let key = normalize_name(name);
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| format!("Unknown arm backend: {}", name))?;
        factory(access)
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Register all built-in backends enabled by features on a context.
pub fn register_builtin_backends_on(context: &mut RegistrationContext) {
    context.register_backend("sim", sim_factory);
    #[cfg(feature = "mycobot")]
    context.register_backend("mycobot", mycobot_factory);
}

fn sim_factory(_access: ArmAccess) -> DynResult<Box<dyn ArmDriver>> {
    Ok(Box::new(SimArm::new()))
}

#[cfg(feature = "mycobot")]
fn mycobot_factory(access: ArmAccess) -> DynResult<Box<dyn ArmDriver>> {
    match access {
        ArmAccess::Serial { path, baud } => Ok(Box::new(MyCobotArm::new(&path, baud)?)),
        ArmAccess::Sim => Err("mycobot backend requires serial access".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_backends_are_registered() {
        let mut context = RegistrationContext::new();
        register_builtin_backends_on(&mut context);
        assert!(context.is_backend_registered("sim"));
        #[cfg(feature = "mycobot")]
        assert!(context.is_backend_registered("mycobot"));
    }

    #[test]
    fn test_backend_names_are_normalized() {
        let mut context = RegistrationContext::new();
        register_builtin_backends_on(&mut context);
        assert!(context.is_backend_registered("SIM"));
        assert!(context.is_backend_registered("Sim "));
        #[cfg(feature = "mycobot")]
        assert!(context.is_backend_registered("MyCobot"));
    }

    #[test]
    fn test_unknown_backend_is_an_error() {
        let mut context = RegistrationContext::new();
        register_builtin_backends_on(&mut context);
        let result = context.build_arm("ur5", ArmAccess::Sim);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_sim_arm() {
        let mut context = RegistrationContext::new();
        register_builtin_backends_on(&mut context);
        let arm = context.build_arm("sim", ArmAccess::Sim).unwrap();
        assert_eq!(arm.info().capabilities.joints, 6);
    }

    #[cfg(feature = "mycobot")]
    #[test]
    fn test_mycobot_rejects_sim_access() {
        let mut context = RegistrationContext::new();
        register_builtin_backends_on(&mut context);
        assert!(context.build_arm("mycobot", ArmAccess::Sim).is_err());
    }
}
