//! Arithmetic evaluation over the term model.
//!
//! `eval` is strict: operands are evaluated before operators. The numeric
//! tower is Integer (arbitrary precision), Float (f64) and Decimal
//! (arbitrary-precision decimal); a mixed integer/float operation promotes
//! to float, anything mixed with a decimal promotes to decimal.
//! Transcendental functions compute in floats and return floats.
//!
//! Faults are raised as `evaluation_error` (zero_divisor, undefined,
//! float_overflow) or `type_error` balls, per the ISO taxonomy.

use std::cmp::Ordering;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, ToBigInt};
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};

use super::error::PrologError;
use super::term::Term;

/// An arithmetic value
#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    Int(BigInt),
    Float(f64),
    Decimal(BigDecimal),
}

impl Number {
    pub fn into_term(self) -> Term {
        match self {
            Number::Int(n) => Term::Int(n),
            Number::Float(f) => Term::Float(f),
            Number::Decimal(d) => Term::Decimal(d),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Number::Int(_) => "integer",
            Number::Float(_) => "float",
            Number::Decimal(_) => "decimal",
        }
    }
}

/// Operand pair after promotion to a common kind
enum Pair {
    Ints(BigInt, BigInt),
    Floats(f64, f64),
    Decimals(BigDecimal, BigDecimal),
}

fn int_to_f64(n: &BigInt) -> Result<f64, PrologError> {
    match n.to_f64() {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(PrologError::evaluation_error("float_overflow")),
    }
}

fn f64_to_decimal(f: f64) -> Result<BigDecimal, PrologError> {
    BigDecimal::try_from(f).map_err(|_| PrologError::evaluation_error("undefined"))
}

fn promote(a: Number, b: Number) -> Result<Pair, PrologError> {
    use Number::*;
    Ok(match (a, b) {
        (Int(x), Int(y)) => Pair::Ints(x, y),
        (Float(x), Float(y)) => Pair::Floats(x, y),
        (Decimal(x), Decimal(y)) => Pair::Decimals(x, y),
        (Int(x), Float(y)) => Pair::Floats(int_to_f64(&x)?, y),
        (Float(x), Int(y)) => Pair::Floats(x, int_to_f64(&y)?),
        (Int(x), Decimal(y)) => Pair::Decimals(BigDecimal::from(x), y),
        (Decimal(x), Int(y)) => Pair::Decimals(x, BigDecimal::from(y)),
        (Float(x), Decimal(y)) => Pair::Decimals(f64_to_decimal(x)?, y),
        (Decimal(x), Float(y)) => Pair::Decimals(x, f64_to_decimal(y)?),
    })
}

fn check_float(f: f64) -> Result<Number, PrologError> {
    if f.is_nan() {
        Err(PrologError::evaluation_error("undefined"))
    } else if f.is_infinite() {
        Err(PrologError::evaluation_error("float_overflow"))
    } else {
        Ok(Number::Float(f))
    }
}

fn as_float(n: &Number) -> Result<f64, PrologError> {
    match n {
        Number::Int(i) => int_to_f64(i),
        Number::Float(f) => Ok(*f),
        Number::Decimal(d) => d
            .to_f64()
            .filter(|f| f.is_finite())
            .ok_or_else(|| PrologError::evaluation_error("float_overflow")),
    }
}

fn as_int(n: Number, culprit: &Term) -> Result<BigInt, PrologError> {
    match n {
        Number::Int(i) => Ok(i),
        _ => Err(PrologError::type_error("integer", culprit.clone())),
    }
}

// Floored division pair; `//` and `rem` truncate instead
fn div_floor(a: &BigInt, b: &BigInt) -> BigInt {
    let q = a / b;
    let r = a % b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        q - 1
    } else {
        q
    }
}

fn mod_floor(a: &BigInt, b: &BigInt) -> BigInt {
    let r = a % b;
    if !r.is_zero() && (r.is_negative() != b.is_negative()) {
        r + b
    } else {
        r
    }
}

fn nonzero_int(n: &BigInt) -> Result<(), PrologError> {
    if n.is_zero() {
        Err(PrologError::evaluation_error("zero_divisor"))
    } else {
        Ok(())
    }
}

/// Numeric comparison across kinds, by mathematical value
pub fn compare_numbers(a: &Number, b: &Number) -> Result<Ordering, PrologError> {
    match promote(a.clone(), b.clone())? {
        Pair::Ints(x, y) => Ok(x.cmp(&y)),
        Pair::Floats(x, y) => x
            .partial_cmp(&y)
            .ok_or_else(|| PrologError::evaluation_error("undefined")),
        Pair::Decimals(x, y) => Ok(x.cmp(&y)),
    }
}

/// Evaluate an arithmetic expression term to a number
pub fn eval(t: &Term) -> Result<Number, PrologError> {
    let t = t.deref();
    match &t {
        Term::Var(_) => Err(PrologError::instantiation()),
        Term::Int(n) => Ok(Number::Int(n.clone())),
        Term::Float(f) => Ok(Number::Float(*f)),
        Term::Decimal(d) => Ok(Number::Decimal(d.clone())),
        Term::Atom(a) => match a.as_str() {
            "pi" => Ok(Number::Float(std::f64::consts::PI)),
            "e" => Ok(Number::Float(std::f64::consts::E)),
            "epsilon" => Ok(Number::Float(f64::EPSILON)),
            _ => Err(PrologError::type_error(
                "evaluable",
                Term::compound("/", vec![t.clone(), Term::int(0)]),
            )),
        },
        Term::Compound(c) => {
            let name = c.tag.name.as_str();
            match c.tag.arity {
                1 => eval_unary(name, &c.args[0]),
                2 => eval_binary(name, &c.args[0], &c.args[1]),
                _ => Err(unknown_function(&t)),
            }
        }
        Term::Handle(_) => Err(PrologError::type_error("evaluable", t.clone())),
    }
}

fn unknown_function(t: &Term) -> PrologError {
    let tag = t.callable_tag().expect("compound");
    PrologError::type_error("evaluable", super::error::indicator(tag))
}

fn eval_unary(name: &str, arg: &Term) -> Result<Number, PrologError> {
    let a = eval(arg)?;
    match name {
        "-" => Ok(match a {
            Number::Int(n) => Number::Int(-n),
            Number::Float(f) => Number::Float(-f),
            Number::Decimal(d) => Number::Decimal(-d),
        }),
        "+" => Ok(a),
        "abs" => Ok(match a {
            Number::Int(n) => Number::Int(n.abs()),
            Number::Float(f) => Number::Float(f.abs()),
            Number::Decimal(d) => Number::Decimal(d.abs()),
        }),
        "sign" => Ok(match a {
            Number::Int(n) => Number::Int(n.signum()),
            Number::Float(f) => Number::Float(if f == 0.0 { 0.0 } else { f.signum() }),
            Number::Decimal(d) => Number::Int(BigInt::from(match d.sign() {
                num_bigint::Sign::Minus => -1,
                num_bigint::Sign::NoSign => 0,
                num_bigint::Sign::Plus => 1,
            })),
        }),
        "floor" => round_to_int(a, RoundMode::Floor),
        "ceiling" => round_to_int(a, RoundMode::Ceiling),
        "round" => round_to_int(a, RoundMode::Nearest),
        "truncate" => round_to_int(a, RoundMode::Truncate),
        "integer" => round_to_int(a, RoundMode::Nearest),
        "float" => Ok(Number::Float(as_float(&a)?)),
        "decimal" => Ok(Number::Decimal(match a {
            Number::Int(n) => BigDecimal::from(n),
            Number::Float(f) => f64_to_decimal(f)?,
            Number::Decimal(d) => d,
        })),
        "sqrt" => match a {
            // Exact square roots stay exact for decimals
            Number::Decimal(d) if !d.is_negative() => d
                .sqrt()
                .map(Number::Decimal)
                .ok_or_else(|| PrologError::evaluation_error("undefined")),
            other => check_float(as_float(&other)?.sqrt()),
        },
        "exp" => check_float(as_float(&a)?.exp()),
        "log" => {
            let f = as_float(&a)?;
            if f <= 0.0 {
                Err(PrologError::evaluation_error("undefined"))
            } else {
                check_float(f.ln())
            }
        }
        "sin" => check_float(as_float(&a)?.sin()),
        "cos" => check_float(as_float(&a)?.cos()),
        "tan" => check_float(as_float(&a)?.tan()),
        "asin" => check_float(as_float(&a)?.asin()),
        "acos" => check_float(as_float(&a)?.acos()),
        "atan" => check_float(as_float(&a)?.atan()),
        "\\" => {
            let n = as_int(a, arg)?;
            // Bitwise complement: -(N) - 1
            Ok(Number::Int(-n - 1))
        }
        _ => Err(unknown_function(&Term::compound(name, vec![arg.clone()]))),
    }
}

enum RoundMode {
    Floor,
    Ceiling,
    Nearest,
    Truncate,
}

fn round_to_int(n: Number, mode: RoundMode) -> Result<Number, PrologError> {
    match n {
        Number::Int(i) => Ok(Number::Int(i)),
        Number::Float(f) => {
            let r = match mode {
                RoundMode::Floor => f.floor(),
                RoundMode::Ceiling => f.ceil(),
                RoundMode::Nearest => f.round(),
                RoundMode::Truncate => f.trunc(),
            };
            BigInt::from_f64(r)
                .map(Number::Int)
                .ok_or_else(|| PrologError::evaluation_error("undefined"))
        }
        Number::Decimal(d) => {
            let truncated = d.with_scale(0);
            let frac_is_zero = d == truncated;
            let t = truncated.to_bigint().expect("scale 0 decimal is integral");
            Ok(Number::Int(match mode {
                RoundMode::Truncate => t,
                RoundMode::Floor => {
                    if d.is_negative() && !frac_is_zero {
                        t - 1
                    } else {
                        t
                    }
                }
                RoundMode::Ceiling => {
                    if !d.is_negative() && !frac_is_zero {
                        t + 1
                    } else {
                        t
                    }
                }
                RoundMode::Nearest => {
                    let shifted = if d.is_negative() {
                        d - BigDecimal::try_from(0.5).expect("exact")
                    } else {
                        d + BigDecimal::try_from(0.5).expect("exact")
                    };
                    shifted
                        .with_scale(0)
                        .to_bigint()
                        .expect("scale 0 decimal is integral")
                }
            }))
        }
    }
}

fn eval_binary(name: &str, lhs: &Term, rhs: &Term) -> Result<Number, PrologError> {
    let a = eval(lhs)?;
    let b = eval(rhs)?;
    match name {
        "+" => match promote(a, b)? {
            Pair::Ints(x, y) => Ok(Number::Int(x + y)),
            Pair::Floats(x, y) => check_float(x + y),
            Pair::Decimals(x, y) => Ok(Number::Decimal(x + y)),
        },
        "-" => match promote(a, b)? {
            Pair::Ints(x, y) => Ok(Number::Int(x - y)),
            Pair::Floats(x, y) => check_float(x - y),
            Pair::Decimals(x, y) => Ok(Number::Decimal(x - y)),
        },
        "*" => match promote(a, b)? {
            Pair::Ints(x, y) => Ok(Number::Int(x * y)),
            Pair::Floats(x, y) => check_float(x * y),
            Pair::Decimals(x, y) => Ok(Number::Decimal(x * y)),
        },
        "/" => match promote(a, b)? {
            Pair::Ints(x, y) => {
                nonzero_int(&y)?;
                // Exact quotients stay integers; 7/2 gives the float 3.5
                if (&x % &y).is_zero() {
                    Ok(Number::Int(x / y))
                } else {
                    check_float(int_to_f64(&x)? / int_to_f64(&y)?)
                }
            }
            Pair::Floats(x, y) => {
                if y == 0.0 {
                    Err(PrologError::evaluation_error("zero_divisor"))
                } else {
                    check_float(x / y)
                }
            }
            Pair::Decimals(x, y) => {
                if y.is_zero() {
                    Err(PrologError::evaluation_error("zero_divisor"))
                } else {
                    Ok(Number::Decimal(x / y))
                }
            }
        },
        "//" => {
            let (x, y) = (as_int(a, lhs)?, as_int(b, rhs)?);
            nonzero_int(&y)?;
            // Truncating division
            Ok(Number::Int(x / y))
        }
        "div" => {
            let (x, y) = (as_int(a, lhs)?, as_int(b, rhs)?);
            nonzero_int(&y)?;
            Ok(Number::Int(div_floor(&x, &y)))
        }
        "mod" => {
            let (x, y) = (as_int(a, lhs)?, as_int(b, rhs)?);
            nonzero_int(&y)?;
            Ok(Number::Int(mod_floor(&x, &y)))
        }
        "rem" => {
            let (x, y) = (as_int(a, lhs)?, as_int(b, rhs)?);
            nonzero_int(&y)?;
            Ok(Number::Int(x % y))
        }
        "min" => Ok(
            if compare_numbers(&a, &b)? == Ordering::Greater {
                b
            } else {
                a
            },
        ),
        "max" => Ok(
            if compare_numbers(&a, &b)? == Ordering::Less {
                b
            } else {
                a
            },
        ),
        "**" => check_float(as_float(&a)?.powf(as_float(&b)?)),
        "^" => match (&a, &b) {
            (Number::Int(x), Number::Int(y)) => {
                if y.is_negative() {
                    if x.abs() == BigInt::from(1) {
                        // (+-1)^(-N) stays integral
                        let exp_is_even = (y % BigInt::from(2)).is_zero();
                        Ok(Number::Int(if x.is_negative() && !exp_is_even {
                            BigInt::from(-1)
                        } else {
                            BigInt::from(1)
                        }))
                    } else if x.is_zero() {
                        Err(PrologError::evaluation_error("zero_divisor"))
                    } else {
                        Err(PrologError::type_error("float", lhs.clone()))
                    }
                } else {
                    let exp = y
                        .to_u32()
                        .ok_or_else(|| PrologError::resource_error("memory"))?;
                    Ok(Number::Int(num_traits::pow::Pow::pow(x, exp)))
                }
            }
            _ => check_float(as_float(&a)?.powf(as_float(&b)?)),
        },
        "atan2" | "atan" => check_float(as_float(&a)?.atan2(as_float(&b)?)),
        ">>" => {
            let (x, y) = (as_int(a, lhs)?, as_int(b, rhs)?);
            let shift = y
                .to_usize()
                .ok_or_else(|| PrologError::evaluation_error("undefined"))?;
            Ok(Number::Int(x >> shift))
        }
        "<<" => {
            let (x, y) = (as_int(a, lhs)?, as_int(b, rhs)?);
            let shift = y
                .to_usize()
                .ok_or_else(|| PrologError::evaluation_error("undefined"))?;
            Ok(Number::Int(x << shift))
        }
        "/\\" => Ok(Number::Int(as_int(a, lhs)? & as_int(b, rhs)?)),
        "\\/" => Ok(Number::Int(as_int(a, lhs)? | as_int(b, rhs)?)),
        "xor" => Ok(Number::Int(as_int(a, lhs)? ^ as_int(b, rhs)?)),
        _ => Err(unknown_function(&Term::compound(
            name,
            vec![lhs.clone(), rhs.clone()],
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ev(t: Term) -> Number {
        eval(&t).unwrap()
    }

    fn bin(op: &str, a: Term, b: Term) -> Term {
        Term::compound(op, vec![a, b])
    }

    #[test]
    fn test_precedence_free_arithmetic() {
        // 2 + 3 * 4 as a tree
        let t = bin("+", Term::int(2), bin("*", Term::int(3), Term::int(4)));
        assert_eq!(ev(t), Number::Int(BigInt::from(14)));
    }

    #[test]
    fn test_division_kinds() {
        assert_eq!(
            ev(bin("/", Term::int(7), Term::int(2))),
            Number::Float(3.5)
        );
        assert_eq!(
            ev(bin("/", Term::int(8), Term::int(2))),
            Number::Int(BigInt::from(4))
        );
        assert_eq!(
            ev(bin("//", Term::int(7), Term::int(2))),
            Number::Int(BigInt::from(3))
        );
        assert_eq!(
            ev(bin("//", Term::int(-7), Term::int(2))),
            Number::Int(BigInt::from(-3)),
            "// truncates toward zero"
        );
        assert_eq!(
            ev(bin("div", Term::int(-7), Term::int(2))),
            Number::Int(BigInt::from(-4)),
            "div floors"
        );
    }

    #[test]
    fn test_mod_follows_divisor_sign() {
        assert_eq!(
            ev(bin("mod", Term::int(-7), Term::int(2))),
            Number::Int(BigInt::from(1))
        );
        assert_eq!(
            ev(bin("rem", Term::int(-7), Term::int(2))),
            Number::Int(BigInt::from(-1))
        );
    }

    #[test]
    fn test_zero_divisor() {
        let e = eval(&bin("/", Term::int(1), Term::int(0))).unwrap_err();
        assert!(format!("{}", e).contains("zero_divisor"));
        let e = eval(&bin("mod", Term::int(1), Term::int(0))).unwrap_err();
        assert!(format!("{}", e).contains("zero_divisor"));
    }

    #[test]
    fn test_promotion_to_float_and_decimal() {
        assert_eq!(
            ev(bin("+", Term::int(1), Term::Float(0.5))),
            Number::Float(1.5)
        );
        let d = BigDecimal::from_str("0.1").unwrap();
        match ev(bin("+", Term::int(1), Term::Decimal(d))) {
            Number::Decimal(r) => assert_eq!(r, BigDecimal::from_str("1.1").unwrap()),
            other => panic!("expected decimal, got {:?}", other),
        }
    }

    #[test]
    fn test_decimal_arithmetic_is_exact() {
        let a = BigDecimal::from_str("0.1").unwrap();
        let b = BigDecimal::from_str("0.2").unwrap();
        match ev(bin("+", Term::Decimal(a), Term::Decimal(b))) {
            Number::Decimal(r) => assert_eq!(r, BigDecimal::from_str("0.3").unwrap()),
            other => panic!("expected decimal, got {:?}", other),
        }
    }

    #[test]
    fn test_bignum_does_not_wrap() {
        let big = ev(bin("^", Term::int(2), Term::int(100)));
        assert_eq!(
            big,
            Number::Int(BigInt::from_str("1267650600228229401496703205376").unwrap())
        );
    }

    #[test]
    fn test_unbound_operand() {
        let e = eval(&bin("+", Term::var(), Term::int(1))).unwrap_err();
        assert!(format!("{}", e).contains("instantiation_error"));
    }

    #[test]
    fn test_unknown_function() {
        let e = eval(&Term::compound("frobnicate", vec![Term::int(1)])).unwrap_err();
        assert!(format!("{}", e).contains("type_error(evaluable"));
    }

    #[test]
    fn test_rounding_family() {
        assert_eq!(
            ev(Term::compound("floor", vec![Term::Float(-1.5)])),
            Number::Int(BigInt::from(-2))
        );
        assert_eq!(
            ev(Term::compound("ceiling", vec![Term::Float(-1.5)])),
            Number::Int(BigInt::from(-1))
        );
        assert_eq!(
            ev(Term::compound("truncate", vec![Term::Float(-1.5)])),
            Number::Int(BigInt::from(-1))
        );
        assert_eq!(
            ev(Term::compound("round", vec![Term::Float(2.5)])),
            Number::Int(BigInt::from(3))
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(
            ev(bin("/\\", Term::int(12), Term::int(10))),
            Number::Int(BigInt::from(8))
        );
        assert_eq!(
            ev(bin("\\/", Term::int(12), Term::int(10))),
            Number::Int(BigInt::from(14))
        );
        assert_eq!(
            ev(bin("xor", Term::int(12), Term::int(10))),
            Number::Int(BigInt::from(6))
        );
        assert_eq!(
            ev(bin("<<", Term::int(1), Term::int(8))),
            Number::Int(BigInt::from(256))
        );
        assert_eq!(
            ev(Term::compound("\\", vec![Term::int(0)])),
            Number::Int(BigInt::from(-1))
        );
    }

    #[test]
    fn test_float_functions() {
        match ev(Term::compound("sqrt", vec![Term::int(2)])) {
            Number::Float(f) => assert!((f - std::f64::consts::SQRT_2).abs() < 1e-12),
            other => panic!("expected float, got {:?}", other),
        }
        let e = eval(&Term::compound("log", vec![Term::int(0)])).unwrap_err();
        assert!(format!("{}", e).contains("undefined"));
    }

    #[test]
    fn test_compare_across_kinds() {
        let i = Number::Int(BigInt::from(2));
        let f = Number::Float(2.0);
        assert_eq!(compare_numbers(&i, &f).unwrap(), Ordering::Equal);
        let d = Number::Decimal(BigDecimal::from_str("2.5").unwrap());
        assert_eq!(compare_numbers(&i, &d).unwrap(), Ordering::Less);
    }
}
