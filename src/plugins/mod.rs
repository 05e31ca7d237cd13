//! Plugins bundled with the crate, addressable by name from the project config.

pub mod notifications;

use crate::plugin::Plugin;

pub const BUNDLED: [&str; 1] = [notifications::ID];

pub fn by_name(name: &str) -> Option<Plugin> {
    match name {
        notifications::ID => Some(notifications::plugin()),
        _ => None,
    }
}
