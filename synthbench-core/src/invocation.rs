//! Parameter Roles and Call Statements
//!
//! A role string assigns one letter per function parameter:
//!
//! | letter | parameter                          |
//! |--------|------------------------------------|
//! | `i`    | input container                    |
//! | `o`    | output container                   |
//! | `r`    | container not reused across calls  |
//! | `p`    | container with non-negative values |
//! | `z`    | container with no zero values      |
//! | `s`    | scalar literal of the element type |
//!
//! The timed statement calls the function `repeat_count` times, storing each result
//! into a `volatile` temporary so an optimizing build cannot drop the calls.

use crate::{
    ConfigurationError, ContainerFlags, ElementType, NamedContainer, REPEAT_VAR, SINK_VAR,
    draw_scalar,
};
use rand::Rng;

/// Role of one function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// `i`
    Input,
    /// `o`
    Output,
    /// `r`
    Fresh,
    /// `p`
    Positive,
    /// `z`
    NonZero,
    /// `s`
    Scalar,
}

impl ParamRole {
    /// Decode a role letter
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'i' => Some(ParamRole::Input),
            'o' => Some(ParamRole::Output),
            'r' => Some(ParamRole::Fresh),
            'p' => Some(ParamRole::Positive),
            'z' => Some(ParamRole::NonZero),
            's' => Some(ParamRole::Scalar),
            _ => None,
        }
    }

    /// Role letter as written in configuration
    pub fn letter(self) -> char {
        match self {
            ParamRole::Input => 'i',
            ParamRole::Output => 'o',
            ParamRole::Fresh => 'r',
            ParamRole::Positive => 'p',
            ParamRole::NonZero => 'z',
            ParamRole::Scalar => 's',
        }
    }

    /// Fill constraints, or `None` for scalar parameters
    pub fn container_flags(self) -> Option<ContainerFlags> {
        match self {
            ParamRole::Input | ParamRole::Output | ParamRole::Fresh => Some(ContainerFlags::PLAIN),
            ParamRole::Positive => Some(ContainerFlags::POSITIVE),
            ParamRole::NonZero => Some(ContainerFlags::NONZERO),
            ParamRole::Scalar => None,
        }
    }
}

/// Decode a role string, one letter per parameter.
pub fn parse_roles(roles: &str) -> Result<Vec<ParamRole>, ConfigurationError> {
    roles
        .chars()
        .map(|c| {
            ParamRole::from_letter(c).ok_or_else(|| ConfigurationError::UnknownRole {
                role: c,
                roles: roles.to_string(),
            })
        })
        .collect()
}

/// Containers and statements for one timed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Containers backing the container parameters, in parameter order
    pub containers: Vec<NamedContainer>,
    /// Statements to time
    pub commands: Vec<String>,
}

/// Build the repeated call to `function`.
///
/// Scalar parameters draw their literal from `rng` here, in parameter order.
pub fn build_invocation<R: Rng + ?Sized>(
    function: &str,
    roles: &[ParamRole],
    element_type: ElementType,
    repeat_count: u64,
    rng: &mut R,
) -> Invocation {
    let mut containers = Vec::new();
    let mut args = Vec::with_capacity(roles.len());

    for (position, role) in roles.iter().enumerate() {
        match role.container_flags() {
            Some(flags) => {
                let container = NamedContainer::for_parameter(position, flags);
                args.push(container.name().to_string());
                containers.push(container);
            }
            None => args.push(draw_scalar(rng, element_type).render(element_type)),
        }
    }

    let line = format!(
        "for (long long {rep} = {}; {rep} >= 0; --{rep}) {{ volatile {} {} = {}({}); }}",
        repeat_count as i64 - 1,
        element_type.name(),
        SINK_VAR,
        function,
        args.join(", "),
        rep = REPEAT_VAR,
    );

    Invocation {
        containers,
        commands: vec![line],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_parse_roles() {
        assert_eq!(
            parse_roles("iopzsr").unwrap(),
            vec![
                ParamRole::Input,
                ParamRole::Output,
                ParamRole::Positive,
                ParamRole::NonZero,
                ParamRole::Scalar,
                ParamRole::Fresh,
            ]
        );
        assert_eq!(
            parse_roles("ix"),
            Err(ConfigurationError::UnknownRole {
                role: 'x',
                roles: "ix".to_string()
            })
        );
        for role in parse_roles("iopzsr").unwrap() {
            assert_eq!(ParamRole::from_letter(role.letter()), Some(role));
        }
    }

    #[test]
    fn test_container_parameters() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let roles = parse_roles("ipo").unwrap();
        let inv = build_invocation("idx_add", &roles, ElementType::Int32, 10, &mut rng);

        let names: Vec<&str> = inv.containers.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["A0", "A1", "A2"]);
        assert_eq!(inv.containers[1].flags(), ContainerFlags::POSITIVE);
        assert_eq!(
            inv.commands,
            vec![
                "for (long long rep = 9; rep >= 0; --rep) { volatile int32 sink = idx_add(A0, A1, A2); }"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_scalar_parameters_skip_container_numbers() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let roles = parse_roles("isz").unwrap();
        let inv = build_invocation("idx_addc", &roles, ElementType::UByte, 1, &mut rng);

        let names: Vec<&str> = inv.containers.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["A0", "A2"]);
        assert_eq!(inv.containers[1].flags(), ContainerFlags::NONZERO);

        let line = &inv.commands[0];
        assert!(line.starts_with("for (long long rep = 0; rep >= 0; --rep)"));
        assert!(line.contains("idx_addc(A0, (ubyte)"));
        assert!(line.ends_with(", A2); }"));
    }

    #[test]
    fn test_scalar_literal_reproducible() {
        let roles = parse_roles("s").unwrap();
        let a = build_invocation("f", &roles, ElementType::Float32, 3, &mut ChaCha8Rng::seed_from_u64(9));
        let b = build_invocation("f", &roles, ElementType::Float32, 3, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
        assert!(a.containers.is_empty());
        assert!(a.commands[0].contains("f((float32)"));
    }
}
