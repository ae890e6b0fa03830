//! Read-only view of the process environment.

use std::collections::HashMap;

pub trait EnvLookup {
    fn var(&self, name: &str) -> Option<String>;
}

/// Looks variables up in the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<E: EnvLookup + ?Sized> EnvLookup for &E {
    fn var(&self, name: &str) -> Option<String> {
        (**self).var(name)
    }
}
