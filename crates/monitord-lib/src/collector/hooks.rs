//! Ordered per-tick update hooks

use std::fmt;

type Hook<C> = Box<dyn FnMut(&mut C)>;

/// Named callbacks run in registration order on every tick
///
/// Registering a name that is already present is a no-op, so repeated
/// enables never invoke a hook twice.
pub struct UpdateHooks<C> {
    hooks: Vec<(String, Hook<C>)>,
}

impl<C> Default for UpdateHooks<C> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<C> fmt::Debug for UpdateHooks<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<C> UpdateHooks<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook under `name`; returns false if the name is taken
    pub fn register<F>(&mut self, name: impl Into<String>, hook: F) -> bool
    where
        F: FnMut(&mut C) + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.hooks.push((name, Box::new(hook)));
        true
    }

    /// Remove the hook registered under `name`; returns false if absent
    pub fn deregister(&mut self, name: &str) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(n, _)| n != name);
        self.hooks.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Invoke every hook in order
    pub fn run(&mut self, context: &mut C) {
        for (_, hook) in self.hooks.iter_mut() {
            hook(context);
        }
    }
}
