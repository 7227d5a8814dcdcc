mod rule;
mod ruleset;
mod rulesets;
mod rules;
mod util;

pub use rule::{Rule, RuleSyntax};
pub use ruleset::Ruleset;
pub use rulesets::Rulesets;
pub use rules::Rules;

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn aws_key_id_pattern_accepts_generated_strings(
            s in r"((?:A3T[A-Z0-9]|AKIA|AGPA|AIDA|AROA|AIPA|ANPA|ANVA|ASIA)[A-Z0-9]{16})"
        ) {
            let re = regex::Regex::new(r"^(?:A3T[A-Z0-9]|AKIA|AGPA|AIDA|AROA|AIPA|ANPA|ANVA|ASIA)[A-Z0-9]{16}$").unwrap();
            prop_assert!(re.is_match(&s));
        }
    }
}
