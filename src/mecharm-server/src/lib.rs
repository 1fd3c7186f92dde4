// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod arm_worker;
pub mod config;
pub mod engine;

pub use arm_worker::ArmWorker;
pub use config::ServerConfig;
pub use engine::{run_engine, EngineConfig};
