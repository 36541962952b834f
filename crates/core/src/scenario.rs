use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role-play situation for a spoken practice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    BehavioralInterview,
    TechnicalInterview,
    Random,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::BehavioralInterview,
        Scenario::TechnicalInterview,
        Scenario::Random,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Scenario::BehavioralInterview => "behavioral-interview",
            Scenario::TechnicalInterview => "technical-interview",
            Scenario::Random => "random",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Scenario::BehavioralInterview => "Behavioral Interview (HR)",
            Scenario::TechnicalInterview => "Technical Interview",
            Scenario::Random => "Casual Chat",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::BehavioralInterview => {
                "Practice answering questions about teamwork, leadership, and conflict resolution."
            }
            Scenario::TechnicalInterview => {
                "Solve a technical problem and explain your thought process."
            }
            Scenario::Random => "A spontaneous chat about a random topic to warm up.",
        }
    }

    /// Persona handed to the model.
    pub fn persona(&self) -> &'static str {
        match self {
            Scenario::BehavioralInterview => {
                "You are 'Alex', a friendly HR manager. Your goal is to assess the candidate's soft skills, cultural fit, and past behavior. Ask classic behavioral questions starting with 'Tell me about a time when...'."
            }
            Scenario::TechnicalInterview => {
                "You are 'Sam', a senior engineer. Your goal is to assess the candidate's technical skills and problem-solving abilities. Present a technical problem or concept and discuss it with them."
            }
            Scenario::Random => {
                "You are a curious and engaging conversationalist. The AI will invent a topic to start the conversation."
            }
        }
    }

    pub fn needs_topic(&self) -> bool {
        !matches!(self, Scenario::Random)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown scenario '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Setting {
    Formal,
    Informal,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Formal => f.write_str("Formal"),
            Setting::Informal => f.write_str("Informal"),
        }
    }
}

impl FromStr for Setting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "formal" => Ok(Setting::Formal),
            "informal" => Ok(Setting::Informal),
            _ => Err(format!("unknown setting '{s}', expected Formal or Informal")),
        }
    }
}

/// Prebuilt voices of the speech synthesis model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Voice {
    #[default]
    Algenib,
    Charon,
    Kore,
    Zephyr,
}

impl Voice {
    pub const ALL: [Voice; 4] = [Voice::Algenib, Voice::Charon, Voice::Kore, Voice::Zephyr];

    pub fn name(&self) -> &'static str {
        match self {
            Voice::Algenib => "Algenib",
            Voice::Charon => "Charon",
            Voice::Kore => "Kore",
            Voice::Zephyr => "Zephyr",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Voice::Algenib => "Male 1",
            Voice::Charon => "Male 2",
            Voice::Kore => "Female 1",
            Voice::Zephyr => "Female 2",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Voice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Voice::ALL
            .into_iter()
            .find(|voice| voice.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let choices: Vec<String> = Voice::ALL
                    .iter()
                    .map(|voice| format!("{} ({})", voice.name(), voice.label()))
                    .collect();
                format!("unknown voice '{s}', expected one of {}", choices.join(", "))
            })
    }
}

/// Everything chosen when a practice session is set up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeConfig {
    pub scenario: Scenario,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub setting: Option<Setting>,
    #[serde(default)]
    pub voice: Voice,
}

impl PracticeConfig {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            topic: None,
            setting: None,
            voice: Voice::default(),
        }
    }

    pub fn is_random_topic(&self) -> bool {
        self.scenario == Scenario::Random
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario_setting_voice() {
        assert_eq!("technical-interview".parse(), Ok(Scenario::TechnicalInterview));
        assert_eq!("Informal".parse(), Ok(Setting::Informal));
        assert_eq!("kore".parse(), Ok(Voice::Kore));
        assert!("mars".parse::<Scenario>().is_err());
        assert_eq!(
            "Puck".parse::<Voice>(),
            Err("unknown voice 'Puck', expected one of Algenib (Male 1), Charon (Male 2), Kore (Female 1), Zephyr (Female 2)".to_string())
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PracticeConfig =
            serde_json::from_str(r#"{"scenario":"random"}"#).unwrap();

        assert!(config.is_random_topic());
        assert!(!config.scenario.needs_topic());
        assert_eq!(config.voice, Voice::Algenib);
        assert_eq!(config.setting, None);
    }
}
