use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentalModel {
    pub concept: String,
    pub logic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRule {
    pub condition: String,
    pub action: String,
    pub reasoning: String,
}

/// An investor persona the model is asked to answer as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub mental_models: Vec<MentalModel>,
    #[serde(default)]
    pub decision_logic: Vec<DecisionRule>,
}
