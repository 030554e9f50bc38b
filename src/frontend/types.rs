use std::fmt::{Display, Formatter};

use serde::Serialize;

macro_rules! static_types {
    ($(($variant:ident $name:literal $numeric:expr)),+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum Type {
            $($variant,)+
        }

        impl Type {
            pub fn name(self) -> &'static str {
                match self {
                    $(Type::$variant => $name,)+
                }
            }

            pub fn is_numeric(self) -> bool {
                match self {
                    $(Type::$variant => $numeric,)+
                }
            }
        }
    };
}

static_types!(
    (Int "int" true),
    (Real "real" true),
    (Bool "bool" false),
    (String "string" false),
    (Void "void" false)
);

impl Type {
    /// Every type except `void` can be stored, passed, read and printed.
    pub fn is_scalar(self) -> bool {
        self != Type::Void
    }

    /// Whether a value of type `self` may be used where `target` is expected.
    /// The only implicit conversion is the widening of `int` into `real`.
    pub fn promotes_to(self, target: Type) -> bool {
        self == target || (self == Type::Int && target == Type::Real)
    }

    /// The common type of two numeric operands, if there is one.
    pub fn unify_numeric(self, other: Type) -> Option<Type> {
        match (self, other) {
            (Type::Int, Type::Int) => Some(Type::Int),
            (Type::Int | Type::Real, Type::Int | Type::Real) => Some(Type::Real),
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Type::Int, Type::Int, Some(Type::Int); "int int")]
    #[test_case(Type::Int, Type::Real, Some(Type::Real); "int real")]
    #[test_case(Type::Real, Type::Int, Some(Type::Real); "real int")]
    #[test_case(Type::Real, Type::Real, Some(Type::Real); "real real")]
    #[test_case(Type::Bool, Type::Int, None; "bool int")]
    #[test_case(Type::String, Type::String, None; "string string")]
    fn unify(lhs: Type, rhs: Type, expected: Option<Type>) {
        assert_eq!(lhs.unify_numeric(rhs), expected);
    }

    #[test]
    fn no_narrowing() {
        assert!(Type::Int.promotes_to(Type::Real));
        assert!(!Type::Real.promotes_to(Type::Int));
        assert!(!Type::Bool.promotes_to(Type::Int));
    }

    #[test]
    fn names() {
        assert_eq!(Type::Real.to_string(), "real");
        assert_eq!(Type::Void.to_string(), "void");
    }
}
