//! Pure floating point imports, one `_float` and one `_double` variant per
//! function, with the semantics of the host's `f32`/`f64` methods.
use ranks_api::abi::{DOUBLE_SUFFIX, FLOAT_SUFFIX, IMPORT_MODULE};
use wasmer::{Function, Imports, Store};

macro_rules! math_bridge {
    (unary: [$($u:ident => $um:ident),* $(,)?], binary: [$($b:ident => $bm:ident),* $(,)?]) => {
        /// Single-argument functions.
        pub const UNARY: &[&str] = &[$(stringify!($u)),*];
        /// Two-argument functions, called as `a.method(b)`.
        pub const BINARY: &[&str] = &[$(stringify!($b)),*];

        /// Defines every math import in `imports`.
        pub fn register(store: &mut Store, imports: &mut Imports) {
            $(
                imports.define(
                    IMPORT_MODULE,
                    &format!("{}{}", stringify!($u), FLOAT_SUFFIX),
                    Function::new_typed(store, |x: f32| -> f32 { x.$um() }),
                );
                imports.define(
                    IMPORT_MODULE,
                    &format!("{}{}", stringify!($u), DOUBLE_SUFFIX),
                    Function::new_typed(store, |x: f64| -> f64 { x.$um() }),
                );
            )*
            $(
                imports.define(
                    IMPORT_MODULE,
                    &format!("{}{}", stringify!($b), FLOAT_SUFFIX),
                    Function::new_typed(store, |a: f32, b: f32| -> f32 { a.$bm(b) }),
                );
                imports.define(
                    IMPORT_MODULE,
                    &format!("{}{}", stringify!($b), DOUBLE_SUFFIX),
                    Function::new_typed(store, |a: f64, b: f64| -> f64 { a.$bm(b) }),
                );
            )*
        }
    };
}

math_bridge! {
    unary: [
        abs => abs,
        acos => acos,
        acosh => acosh,
        asin => asin,
        asinh => asinh,
        atan => atan,
        atanh => atanh,
        cbrt => cbrt,
        ceil => ceil,
        cos => cos,
        cosh => cosh,
        exp => exp,
        exp2 => exp2,
        expm1 => exp_m1,
        floor => floor,
        fract => fract,
        ln => ln,
        ln1p => ln_1p,
        log10 => log10,
        log2 => log2,
        recip => recip,
        round => round,
        signum => signum,
        sin => sin,
        sinh => sinh,
        sqrt => sqrt,
        tan => tan,
        tanh => tanh,
        trunc => trunc,
    ],
    binary: [
        atan2 => atan2,
        copysign => copysign,
        div_euclid => div_euclid,
        hypot => hypot,
        log => log,
        max => max,
        min => min,
        powf => powf,
        rem_euclid => rem_euclid,
    ]
}
