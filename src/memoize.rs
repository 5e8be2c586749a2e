//! Memoization Module
//!
//! Wraps a function of named parameters in a [`Cache`]. Call arguments are
//! bound to the declared parameter names, so positional and keyword forms of
//! the same call share one entry.

use std::collections::BTreeMap;

use crate::cache::{Cache, CompositeKey, KeyValue, Opts};
use crate::error::{CacheError, Result};

// == Signature ==
/// Declared parameter names of a memoized function, in order, plus any
/// defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<String>,
    defaults: BTreeMap<String, KeyValue>,
}

impl Signature {
    pub fn new<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            defaults: BTreeMap::new(),
        }
    }

    /// Gives `name` a default used when a call omits it. Declares the
    /// parameter if it is not declared yet.
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        let name = name.into();
        if !self.params.contains(&name) {
            self.params.push(name.clone());
        }
        self.defaults.insert(name, value.into());
        self
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    // == Bind ==
    /// Binds positional and keyword arguments to parameter names.
    ///
    /// The i-th positional argument binds to the i-th parameter; omitted
    /// parameters take their default.
    pub fn bind(&self, positional: &[KeyValue], keyword: &[(String, KeyValue)]) -> Result<Opts> {
        if positional.len() > self.params.len() {
            return Err(CacheError::InvalidArguments(format!(
                "takes {} positional arguments but {} were given",
                self.params.len(),
                positional.len()
            )));
        }

        let mut opts = Opts::new();
        for (name, value) in self.params.iter().zip(positional) {
            opts.insert(name.as_str(), value.clone());
        }

        for (name, value) in keyword {
            if !self.params.contains(name) {
                return Err(CacheError::InvalidArguments(format!(
                    "got an unexpected keyword argument '{name}'"
                )));
            }
            if opts.insert(name.as_str(), value.clone()).is_some() {
                return Err(CacheError::InvalidArguments(format!(
                    "got multiple values for argument '{name}'"
                )));
            }
        }

        for name in &self.params {
            if opts.contains(name) {
                continue;
            }
            match self.defaults.get(name) {
                Some(default) => {
                    opts.insert(name.as_str(), default.clone());
                }
                None => {
                    return Err(CacheError::InvalidArguments(format!(
                        "missing required argument '{name}'"
                    )))
                }
            }
        }

        Ok(opts)
    }
}

// == Call Args ==
/// Arguments of one call to a memoized function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<KeyValue>,
    keyword: Vec<(String, KeyValue)>,
    namespace: Option<String>,
    key: Option<CompositeKey>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-addresses an entry by the key it was stored under, e.g. one taken
    /// from [`Cache::entries`].
    pub fn key(key: CompositeKey) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<KeyValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Adds a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }

    /// Stores the result under a separate namespace. Never passed to the
    /// function.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

// == Memoizer ==
/// A function whose results are cached by normalized arguments.
///
/// Built with [`CacheBuilder::memoize`](crate::CacheBuilder::memoize).
pub struct Memoizer<V> {
    name: String,
    signature: Signature,
    cache: Cache<V>,
}

impl<V> Memoizer<V>
where
    V: Clone + Send + 'static,
{
    pub(crate) fn new(name: String, signature: Signature, cache: Cache<V>) -> Self {
        Self { name, signature, cache }
    }

    /// Returns the cached result for `args`, calling the function on a miss.
    /// `None` if the result is already expired once stored.
    pub fn call(&self, args: &CallArgs) -> Result<Option<V>> {
        let (key, opts) = self.resolve(args)?;
        self.cache.get(key, &opts)
    }

    /// The composite key a call with `args` reads and writes.
    pub fn input_to_full_key(&self, args: &CallArgs) -> Result<CompositeKey> {
        let (key, opts) = self.resolve(args)?;
        Ok(self.cache.compose(key, &opts))
    }

    pub fn ttl(&self, args: &CallArgs) -> Result<f64> {
        let (key, opts) = self.resolve(args)?;
        self.cache.ttl(key, &opts)
    }

    pub fn expired(&self, args: &CallArgs) -> Result<bool> {
        let (key, opts) = self.resolve(args)?;
        self.cache.expired(key, &opts)
    }

    pub fn delete(&self, args: &CallArgs) -> Result<()> {
        let (key, opts) = self.resolve(args)?;
        self.cache.delete(key, &opts)
    }

    pub fn exists(&self, args: &CallArgs) -> Result<bool> {
        let (key, opts) = self.resolve(args)?;
        self.cache.exists(key, &opts)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The underlying cache, for `clean`, `reset` and enumeration.
    pub fn cache(&self) -> &Cache<V> {
        &self.cache
    }

    fn resolve(&self, args: &CallArgs) -> Result<(KeyValue, Opts)> {
        if let Some(key) = &args.key {
            return Ok((KeyValue::from(key), Opts::new()));
        }

        let mut opts = self.signature.bind(&args.positional, &args.keyword)?;
        if let Some(namespace) = &args.namespace {
            opts = opts.in_namespace(namespace.as_str());
        }
        Ok((KeyValue::Str(self.name.clone()), opts))
    }
}
