/// Associativity of a binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation (`not`)
    Not,
    /// Logical negation (`!`)
    Bang,
    /// Numeric negation (`-`)
    Negate,
    /// Numeric identity (`+`)
    Plus,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "not" => UnaryOp::Not,
            "!" => UnaryOp::Bang,
            "-" => UnaryOp::Negate,
            "+" => UnaryOp::Plus,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Bang => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
        }
    }

    /// Operand binding strength; `not` binds looser than arithmetic.
    pub fn precedence(&self) -> u16 {
        match self {
            UnaryOp::Not | UnaryOp::Bang => 50,
            UnaryOp::Negate | UnaryOp::Plus => 500,
        }
    }

    /// JavaScript spelling.
    pub fn js(&self) -> &'static str {
        match self {
            UnaryOp::Not | UnaryOp::Bang => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
        }
    }
}

/// Binary operators.
///
/// Word and symbol spellings of the same logical operator (`and`/`&&`,
/// `or`/`||`) map to one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Logical
    /// `or`, `||`
    Or,
    /// `and`, `&&`
    And,
    /// `xor`
    Xor,

    // Bitwise
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,

    // Comparison
    /// `==`
    Equal,
    /// `===`
    Identical,
    /// `!=`
    NotEqual,
    /// `!==`
    NotIdentical,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,

    // Membership, regex and string predicates
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `matches`
    Matches,
    /// `contains`
    Contains,
    /// `starts with`
    StartsWith,
    /// `ends with`
    EndsWith,

    /// `..`
    Range,

    // Arithmetic
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `~`
    Concat,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `**`
    Power,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        use BinaryOp::*;
        Some(match symbol {
            "or" | "||" => Or,
            "and" | "&&" => And,
            "xor" => Xor,
            "|" => BitOr,
            "^" => BitXor,
            "&" => BitAnd,
            "==" => Equal,
            "===" => Identical,
            "!=" => NotEqual,
            "!==" => NotIdentical,
            "<" => Less,
            ">" => Greater,
            "<=" => LessEqual,
            ">=" => GreaterEqual,
            "in" => In,
            "not in" => NotIn,
            "matches" => Matches,
            "contains" => Contains,
            "starts with" => StartsWith,
            "ends with" => EndsWith,
            ".." => Range,
            "+" => Add,
            "-" => Subtract,
            "~" => Concat,
            "*" => Multiply,
            "/" => Divide,
            "%" => Modulo,
            "**" => Power,
            _ => return None,
        })
    }

    /// Canonical expression-language spelling.
    pub fn as_str(&self) -> &'static str {
        use BinaryOp::*;
        match self {
            Or => "or",
            And => "and",
            Xor => "xor",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Equal => "==",
            Identical => "===",
            NotEqual => "!=",
            NotIdentical => "!==",
            Less => "<",
            Greater => ">",
            LessEqual => "<=",
            GreaterEqual => ">=",
            In => "in",
            NotIn => "not in",
            Matches => "matches",
            Contains => "contains",
            StartsWith => "starts with",
            EndsWith => "ends with",
            Range => "..",
            Add => "+",
            Subtract => "-",
            Concat => "~",
            Multiply => "*",
            Divide => "/",
            Modulo => "%",
            Power => "**",
        }
    }

    pub fn precedence(&self) -> u16 {
        use BinaryOp::*;
        match self {
            Or => 10,
            Xor => 12,
            And => 15,
            BitOr => 16,
            BitXor => 17,
            BitAnd => 18,
            Equal | Identical | NotEqual | NotIdentical | Less | Greater | LessEqual
            | GreaterEqual | In | NotIn | Matches | Contains | StartsWith | EndsWith => 20,
            Range => 25,
            Add | Subtract => 30,
            Concat => 40,
            Multiply | Divide | Modulo => 60,
            Power => 200,
        }
    }

    pub fn associativity(&self) -> Associativity {
        match self {
            BinaryOp::Power => Associativity::Right,
            _ => Associativity::Left,
        }
    }

    /// JavaScript infix spelling for operators compiled as `(left op right)`.
    /// `None` for operators that compile to a helper call or a method chain.
    pub fn js_infix(&self) -> Option<&'static str> {
        use BinaryOp::*;
        Some(match self {
            Or => "||",
            And => "&&",
            BitOr => "|",
            BitXor => "^",
            BitAnd => "&",
            Equal => "==",
            Identical => "===",
            NotEqual => "!=",
            NotIdentical => "!==",
            Less => "<",
            Greater => ">",
            LessEqual => "<=",
            GreaterEqual => ">=",
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Modulo => "%",
            Xor | In | NotIn | Matches | Contains | StartsWith | EndsWith | Range | Concat
            | Power => return None,
        })
    }

    /// Whether the right operand may be skipped depending on the left one.
    pub fn short_circuits(&self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spellings_round_trip() {
        for symbol in ["or", "and", "xor", "not in", "starts with", "**", "..", "~", "!=="] {
            let op = BinaryOp::from_symbol(symbol).unwrap();
            assert_eq!(op.as_str(), symbol, "Failed for symbol: {}", symbol);
        }
        assert_eq!(BinaryOp::from_symbol("&&"), Some(BinaryOp::And));
        assert_eq!(BinaryOp::from_symbol("||"), Some(BinaryOp::Or));
        assert_eq!(BinaryOp::from_symbol("not"), None);
    }

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Multiply.precedence());
        assert!(BinaryOp::Multiply.precedence() < BinaryOp::Power.precedence());
        assert_eq!(BinaryOp::Power.associativity(), Associativity::Right);
        assert!(UnaryOp::Not.precedence() < UnaryOp::Negate.precedence());
    }
}
