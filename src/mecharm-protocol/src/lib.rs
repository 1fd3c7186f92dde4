// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod action;
pub mod codec;
pub mod event;
pub mod registry;
pub mod topics;
pub mod validate;

pub use action::Action;
pub use codec::{decode_action, decode_event, encode_action, encode_event, DecodeError};
pub use event::Event;
pub use registry::TagRegistry;
pub use topics::TopicRouter;
pub use validate::{validate_action, ValidateError};
