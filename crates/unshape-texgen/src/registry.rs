//! Method registry.

use crate::error::{TexgenError, TexgenResult};
use crate::kernels;
use crate::method::{Method, TextureKernel};
use std::collections::HashMap;
use std::fmt;

/// Builds a fresh [`Method`].
pub type MethodConstructor = Box<dyn Fn() -> Method + Send + Sync>;

/// Mapping from method names to constructors.
///
/// A registry is filled once and only read afterwards, so it can be shared
/// across threads for lookups.
///
/// # Example
///
/// ```
/// use unshape_texgen::{Context, ElementType, Image, ImageDim, Registry, WhiteNoiseParams};
///
/// let registry = Registry::new_builtin();
/// let method = registry.build("white_noise").unwrap();
///
/// let ctx = Context::new_cpu().unwrap();
/// let mut image = Image::new_cpu(ImageDim::new(4, 4, 1, 1), ElementType::UInt8).unwrap();
/// method.compute_typed(&ctx, &mut image, &WhiteNoiseParams::new(42)).unwrap();
///
/// assert!(registry.build("nonexistent").is_err());
/// ```
#[derive(Default)]
pub struct Registry {
    constructors: HashMap<String, MethodConstructor>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in kernels.
    pub fn new_builtin() -> Self {
        let mut registry = Self::new();
        kernels::register_builtin(&mut registry);
        registry
    }

    /// Registers a constructor, replacing any previous entry of that name.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Method + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Registers a [`TextureKernel`] under `name`.
    pub fn register_kernel<K: TextureKernel>(&mut self, name: &str) {
        let owned = name.to_string();
        self.register(name, move || Method::from_kernel::<K>(owned.as_str()));
    }

    /// Builds the method registered under `name`.
    pub fn build(&self, name: &str) -> TexgenResult<Method> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| TexgenError::UnknownMethod(name.to_string()))?;
        tracing::debug!(method = name, "built method");
        Ok(constructor())
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered methods.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns `true` if no methods are registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("methods", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::DebugFill;

    #[test]
    fn test_registry_empty() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_builtin() {
        let registry = Registry::new_builtin();
        assert_eq!(
            registry.names(),
            vec![
                "debug",
                "gradient_noise",
                "simplex_noise",
                "value_noise",
                "white_noise"
            ]
        );

        let method = registry.build("simplex_noise").unwrap();
        assert_eq!(method.name(), "simplex_noise");
        assert_eq!(method.params_size(), 20);
        assert_eq!(registry.build("white_noise").unwrap().params_size(), 4);
    }

    #[test]
    fn test_registry_unknown() {
        let registry = Registry::new_builtin();
        let err = registry.build("nonexistent").unwrap_err();
        assert!(matches!(err, TexgenError::UnknownMethod(ref name) if name == "nonexistent"));
        assert!(!err.to_string().is_empty());
        assert!(!registry.contains("Debug"));
    }

    #[test]
    fn test_registry_register_custom() {
        let mut registry = Registry::new();
        registry.register_kernel::<DebugFill>("fill");
        assert!(registry.contains("fill"));
        assert_eq!(registry.build("fill").unwrap().name(), "fill");

        registry.register("fill", || Method::from_kernel::<DebugFill>("replaced"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.build("fill").unwrap().name(), "replaced");
    }
}
