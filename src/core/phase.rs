//! Spec lifecycle phases

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a spec, declared in workflow order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Requirements,
    Design,
    Tasks,
    Implementation,
    Review,
    Completed,
}

impl Phase {
    /// All phases in lifecycle order
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Requirements,
            Phase::Design,
            Phase::Tasks,
            Phase::Implementation,
            Phase::Review,
            Phase::Completed,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Requirements => "requirements",
            Phase::Design => "design",
            Phase::Tasks => "tasks",
            Phase::Implementation => "implementation",
            Phase::Review => "review",
            Phase::Completed => "completed",
        }
    }

    /// The phase that follows this one, if any
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Requirements => Some(Phase::Design),
            Phase::Design => Some(Phase::Tasks),
            Phase::Tasks => Some(Phase::Implementation),
            Phase::Implementation => Some(Phase::Review),
            Phase::Review => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }

    /// Whether moving from `self` to `to` follows the declared sequence
    pub fn is_next_step(&self, to: Phase) -> bool {
        self.next() == Some(to)
    }

    /// Label applied to the remote issue for this phase
    pub fn label(&self) -> String {
        format!("phase:{}", self.as_str())
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "requirements" => Ok(Phase::Requirements),
            "design" => Ok(Phase::Design),
            "tasks" => Ok(Phase::Tasks),
            "implementation" => Ok(Phase::Implementation),
            "review" => Ok(Phase::Review),
            "completed" => Ok(Phase::Completed),
            _ => Err(format!("Unknown phase: {}", s)),
        }
    }
}

impl clap::ValueEnum for Phase {
    fn value_variants<'a>() -> &'a [Self] {
        Phase::all()
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(Phase::Requirements < Phase::Design);
        assert!(Phase::Review < Phase::Completed);
        assert_eq!(Phase::all().len(), 6);
    }

    #[test]
    fn test_next_step() {
        assert!(Phase::Requirements.is_next_step(Phase::Design));
        assert!(Phase::Tasks.is_next_step(Phase::Implementation));
        assert!(!Phase::Requirements.is_next_step(Phase::Tasks));
        assert!(!Phase::Design.is_next_step(Phase::Requirements));
        assert_eq!(Phase::Completed.next(), None);
    }

    #[test]
    fn test_phase_parse_display() {
        for phase in Phase::all() {
            assert_eq!(phase.to_string().parse::<Phase>().unwrap(), *phase);
        }
        assert_eq!("Design".parse::<Phase>().unwrap(), Phase::Design);
        assert!("shipping".parse::<Phase>().is_err());
    }

    #[test]
    fn test_phase_label() {
        assert_eq!(Phase::Implementation.label(), "phase:implementation");
    }
}
