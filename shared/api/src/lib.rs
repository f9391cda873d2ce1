//! The contract between the arena host and tank programs.
//!
//! A tank program is a WebAssembly module exporting a zero-argument entry
//! point named [`abi::ENTRY_POINT`] that never returns. Everything the program
//! can do to the arena goes through the imports listed in [`abi`], all of which
//! live in the [`abi::IMPORT_MODULE`] namespace.
//!
//! When compiled for `wasm32` this crate also provides [`prelude`], a thin safe
//! wrapper over those imports for tank programs written in Rust.
#![warn(missing_docs)]

pub mod scan;

/// Import and export names making up the guest ABI.
pub mod abi {
    /// Module namespace of every host import.
    pub const IMPORT_MODULE: &str = "env";
    /// Exported guest entry point.
    pub const ENTRY_POINT: &str = "tank";
    /// Exported linear memory, needed only by `post_string`.
    pub const MEMORY: &str = "memory";

    #[allow(missing_docs)]
    pub mod imports {
        pub const SCAN: &str = "scan";
        pub const FIRE: &str = "fire";
        pub const AIM: &str = "aim";
        pub const TURN: &str = "turn";
        pub const GPSX: &str = "gpsx";
        pub const GPSY: &str = "gpsy";
        pub const FORWARD: &str = "forward";
        pub const EXPLODE: &str = "explode";
        pub const YIELD: &str = "yield";
        pub const TEMP: &str = "temp";
        pub const POST_STRING: &str = "post_string";
        pub const POST_FLOAT: &str = "post_float";
        pub const DEATH_HEAT: &str = "DEATH_HEAT";
        pub const SHOOT_HEAT: &str = "SHOOT_HEAT";
        pub const TANK_VELOCITY: &str = "TANK_VELOCITY";
    }

    /// Suffix of single precision math imports (`sin_float`).
    pub const FLOAT_SUFFIX: &str = "_float";
    /// Suffix of double precision math imports (`sin_double`).
    pub const DOUBLE_SUFFIX: &str = "_double";
}

/// Longest message accepted by `post_string`, in bytes. Longer messages are truncated.
pub const MAX_MESSAGE_LENGTH: usize = 1024;

#[doc(hidden)]
#[cfg(target_arch = "wasm32")]
pub mod sys {
    #[link(wasm_import_module = "env")]
    extern "C" {
        pub fn scan(angle: f32, width: f32) -> u64;
        pub fn fire();
        pub fn aim(angle: f32);
        pub fn turn(angle: f32);
        pub fn gpsx() -> f32;
        pub fn gpsy() -> f32;
        pub fn forward();
        pub fn explode();
        #[link_name = "yield"]
        pub fn yield_now();
        pub fn temp() -> i32;
        pub fn post_string(ptr: *const u8);
        pub fn post_float(value: f32);
        #[allow(non_snake_case)]
        pub fn DEATH_HEAT() -> i32;
        #[allow(non_snake_case)]
        pub fn SHOOT_HEAT() -> i32;
        #[allow(non_snake_case)]
        pub fn TANK_VELOCITY() -> f32;
    }
}

/// Safe wrappers over the host imports.
#[cfg(target_arch = "wasm32")]
pub mod prelude {
    pub use crate::scan::{decode, Contact};
    use crate::sys;

    /// Looks for the nearest other tank within `width` radians of `angle`.
    pub fn scan(angle: f32, width: f32) -> Option<Contact> {
        decode(unsafe { sys::scan(angle, width) })
    }

    /// Fires along the current aim. Ignored by the host when too hot.
    pub fn fire() {
        unsafe { sys::fire() }
    }

    /// Points the weapon at an absolute angle (radians).
    pub fn aim(angle: f32) {
        unsafe { sys::aim(angle) }
    }

    /// Sets the absolute heading (radians) used by [`forward`].
    pub fn turn(angle: f32) {
        unsafe { sys::turn(angle) }
    }

    /// Returns the current position.
    pub fn position() -> (f32, f32) {
        unsafe { (sys::gpsx(), sys::gpsy()) }
    }

    /// Moves one step along the heading.
    pub fn forward() {
        unsafe { sys::forward() }
    }

    /// Self-destructs, taking nearby tanks along.
    pub fn explode() {
        unsafe { sys::explode() }
    }

    /// Ends this turn. Execution continues here on the next tick.
    pub fn yield_now() {
        unsafe { sys::yield_now() }
    }

    /// Returns the current weapon heat.
    pub fn heat() -> i32 {
        unsafe { sys::temp() }
    }

    /// Heat at which the tank is destroyed.
    pub fn death_heat() -> i32 {
        unsafe { sys::DEATH_HEAT() }
    }

    /// Heat added by each shot.
    pub fn shoot_heat() -> i32 {
        unsafe { sys::SHOOT_HEAT() }
    }

    /// Distance covered by each call to [`forward`].
    pub fn tank_velocity() -> f32 {
        unsafe { sys::TANK_VELOCITY() }
    }

    /// Returns true if a shot now would be accepted.
    pub fn can_fire() -> bool {
        heat() < death_heat() - shoot_heat()
    }

    /// Sends a message to the host log.
    pub fn post(msg: &str) {
        let mut buf = Vec::with_capacity(msg.len() + 1);
        buf.extend(msg.bytes().filter(|&b| b != 0));
        buf.push(0);
        unsafe { sys::post_string(buf.as_ptr()) }
    }

    /// Sends a number to the host log.
    pub fn post_float(value: f32) {
        unsafe { sys::post_float(value) }
    }
}
