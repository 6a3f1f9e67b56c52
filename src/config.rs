use std::env;
use std::fmt::Debug;
use std::str::FromStr;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the value of the named environment variable, treating blank
/// values as missing.
pub fn get_optional_variable(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses the named environment variable, falling back to `default` if
/// it is missing. Panics if it is present but cannot be parsed.
pub fn get_parsed_variable<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Debug,
{
    match get_optional_variable(name) {
        Some(value) => value
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("could not parse {} environment variable: {:?}", name, e)),
        None => default,
    }
}

/// Reads an on/off switch. Anything other than `0`, `false`, `no` or
/// `off` turns it on.
pub fn get_flag(name: &str, default: bool) -> bool {
    match get_optional_variable(name) {
        Some(value) => !matches!(
            value.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variables_use_defaults() {
        assert_eq!(get_parsed_variable("PORTFOLIO_TEST_UNSET_NUMBER", 10u32), 10);
        assert!(get_flag("PORTFOLIO_TEST_UNSET_FLAG", true));
        assert_eq!(get_optional_variable("PORTFOLIO_TEST_UNSET_STRING"), None);
    }

    #[test]
    fn flags_can_be_switched_off() {
        env::set_var("PORTFOLIO_TEST_FLAG_OFF", "False");
        env::set_var("PORTFOLIO_TEST_FLAG_ON", "1");

        assert!(!get_flag("PORTFOLIO_TEST_FLAG_OFF", true));
        assert!(get_flag("PORTFOLIO_TEST_FLAG_ON", false));
    }

    #[test]
    #[should_panic(expected = "must define PORTFOLIO_TEST_REQUIRED environment variable")]
    fn required_variables_panic_when_missing() {
        get_variable("PORTFOLIO_TEST_REQUIRED");
    }
}
