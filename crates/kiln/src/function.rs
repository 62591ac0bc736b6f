//! Functions available to queries.

use kiln_core::{stmt::Type, Error, Result};

use indexmap::IndexMap;

/// Functions a query may call, with their arity and result type.
///
/// Built once per session factory and consulted by reference while
/// compiling queries. Names are case-insensitive.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: IndexMap<String, FunctionDescriptor>,
}

#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub min_args: usize,

    /// `None` for variadic functions
    pub max_args: Option<usize>,

    pub returns: ReturnType,

    /// Aggregates may not be nested and accept `DISTINCT`.
    pub aggregate: bool,
}

/// How the result type of a call is derived.
#[derive(Debug, Clone)]
pub enum ReturnType {
    /// Always this type
    Fixed(Type),

    /// The type of the first argument
    FirstArgument,

    /// The widest numeric type among the arguments: `I64` for integers,
    /// `F64` otherwise
    WidenedNumeric,
}

impl FunctionRegistry {
    /// A registry with no functions at all.
    pub fn empty() -> FunctionRegistry {
        FunctionRegistry {
            functions: IndexMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, descriptor: FunctionDescriptor) -> &mut Self {
        self.functions.insert(name.to_ascii_lowercase(), descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.get(&name.to_ascii_lowercase())
    }

    /// Checks a call and returns its result type.
    pub(crate) fn resolve(&self, name: &str, args: &[Type], distinct: bool) -> Result<Type> {
        let Some(descriptor) = self.get(name) else {
            return Err(Error::semantic(None, format!("unknown function `{name}`")));
        };

        let arity_ok = args.len() >= descriptor.min_args
            && descriptor.max_args.map_or(true, |max| args.len() <= max);
        if !arity_ok {
            return Err(Error::semantic(
                None,
                format!(
                    "function `{name}` does not accept {} argument(s)",
                    args.len()
                ),
            ));
        }

        if distinct && !descriptor.aggregate {
            return Err(Error::semantic(
                None,
                format!("DISTINCT is only allowed in aggregate functions, not `{name}`"),
            ));
        }

        Ok(match &descriptor.returns {
            ReturnType::Fixed(ty) => ty.clone(),
            ReturnType::FirstArgument => args.first().cloned().unwrap_or(Type::Unknown),
            ReturnType::WidenedNumeric => {
                if args.iter().all(|ty| matches!(ty, Type::I32 | Type::I64)) {
                    Type::I64
                } else {
                    Type::F64
                }
            }
        })
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        use ReturnType::*;

        let mut registry = FunctionRegistry::empty();

        let f = |min_args, max_args, returns| FunctionDescriptor {
            min_args,
            max_args,
            returns,
            aggregate: false,
        };
        let agg = |returns| FunctionDescriptor {
            min_args: 1,
            max_args: Some(1),
            returns,
            aggregate: true,
        };

        registry
            .register("count", agg(Fixed(Type::I64)))
            .register("sum", agg(WidenedNumeric))
            .register("avg", agg(Fixed(Type::F64)))
            .register("min", agg(FirstArgument))
            .register("max", agg(FirstArgument))
            .register("lower", f(1, Some(1), Fixed(Type::String)))
            .register("upper", f(1, Some(1), Fixed(Type::String)))
            .register("trim", f(1, Some(1), Fixed(Type::String)))
            .register("length", f(1, Some(1), Fixed(Type::I32)))
            .register("concat", f(2, None, Fixed(Type::String)))
            .register("substring", f(2, Some(3), Fixed(Type::String)))
            .register("coalesce", f(2, None, FirstArgument))
            .register("abs", f(1, Some(1), FirstArgument))
            .register("mod", f(2, Some(2), Fixed(Type::I64)))
            .register("current_date", f(0, Some(0), Fixed(Type::Date)))
            .register("current_timestamp", f(0, Some(0), Fixed(Type::Timestamp)));

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_return_types() {
        let registry = FunctionRegistry::default();
        assert_eq!(registry.resolve("COUNT", &[Type::String], true).unwrap(), Type::I64);
        assert_eq!(registry.resolve("sum", &[Type::I32], false).unwrap(), Type::I64);
        assert_eq!(registry.resolve("sum", &[Type::F64], false).unwrap(), Type::F64);
        assert_eq!(
            registry.resolve("coalesce", &[Type::Timestamp, Type::Unknown], false).unwrap(),
            Type::Timestamp
        );
    }

    #[test]
    fn rejects_bad_calls() {
        let registry = FunctionRegistry::default();
        assert!(registry.resolve("lower", &[], false).unwrap_err().is_semantic());
        assert!(registry.resolve("soundex", &[Type::String], false).unwrap_err().is_semantic());
        assert!(registry.resolve("upper", &[Type::String], true).unwrap_err().is_semantic());
    }
}
