//! Runtime-configurable options, set through `XGC_`-prefixed environment
//! variables (such as `XGC_TRIGGER_POLICY=force`).

use crate::trigger::TriggerPolicy;

/// Below this storage size a cross-reference cycle never pays for its
/// rendezvous cost.
pub const DEFAULT_MINIMAL_THRESHOLD: usize = 1024;
/// Next-cycle threshold growth over the post-sweep storage size, in percent.
pub const DEFAULT_GROWTH_PERCENT: usize = 100;

fn always_valid<T>(_: &T) -> bool {
    true
}

macro_rules! options {
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($name: $type[$validator] = $default),*);
    ];
    ($($name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        pub struct Options {
            $(pub $name: $type),*
        }
        impl Options {
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by calling set_from_str()) to the right type
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        // Validate
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            // Only set value if valid.
                            self.$name = val.clone();
                        } else {
                            eprintln!("Warn: unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        eprintln!("Warn: unable to set {}={:?}. Cant parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => panic!("Invalid Options key")
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                let mut options = Options {
                    $($name: $default),*
                };

                // If we have env vars that start with XGC_ and match any option (such as
                // XGC_TRIGGER_POLICY), we set the option to its value (if it is a valid value).
                // Otherwise, use the default value.
                const PREFIX: &str = "XGC_";
                for (key, val) in std::env::vars() {
                    // strip the prefix, and get the lower case string
                    if let Some(rest_of_key) = key.strip_prefix(PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { options.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
                return options;
            }
        }
    ]
}

options! {
    // The policy deciding whether a host collection also runs a cross-reference cycle.
    trigger_policy:    TriggerPolicy [always_valid]          = TriggerPolicy::Default,
    // Storage size below which the default policy never triggers.
    minimal_threshold: usize         [|v: &usize| *v > 0]    = DEFAULT_MINIMAL_THRESHOLD,
    // Percentage growth of the next-cycle threshold over the post-sweep storage size.
    growth_percent:    usize         [|v: &usize| *v > 0]    = DEFAULT_GROWTH_PERCENT,
}
