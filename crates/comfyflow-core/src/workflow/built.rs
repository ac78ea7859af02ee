//! A finished workflow and its parameter bindings.

use comfyflow_abstraction::{Result, WorkflowError, WorkflowReason};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::graph::{GraphError, Input, NodeId, WorkflowGraph};
use super::params::{MAX_DIMENSION, MAX_STEPS, invalid};

/// User-facing generation parameters a workflow can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamName {
    Prompt,
    NegativePrompt,
    Width,
    Height,
    Steps,
    Seed,
    Cfg,
    SamplerName,
    Scheduler,
    Strength,
}

impl ParamName {
    pub const ALL: [Self; 10] = [
        Self::Prompt,
        Self::NegativePrompt,
        Self::Width,
        Self::Height,
        Self::Steps,
        Self::Seed,
        Self::Cfg,
        Self::SamplerName,
        Self::Scheduler,
        Self::Strength,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::NegativePrompt => "negativePrompt",
            Self::Width => "width",
            Self::Height => "height",
            Self::Steps => "steps",
            Self::Seed => "seed",
            Self::Cfg => "cfg",
            Self::SamplerName => "samplerName",
            Self::Scheduler => "scheduler",
            Self::Strength => "strength",
        }
    }

    /// Checks that `value` is acceptable for this parameter.
    ///
    /// # Errors
    /// `INVALID_PARAMS` with the parameter name as `field`.
    pub fn check(self, value: &Value) -> Result<()> {
        let (valid, expected) = match self {
            Self::Prompt | Self::NegativePrompt => (value.is_string(), "a string".to_string()),
            Self::SamplerName | Self::Scheduler => (
                value.as_str().is_some_and(|s| !s.trim().is_empty()),
                "a non-empty string".to_string(),
            ),
            Self::Width | Self::Height => (
                value.as_u64().is_some_and(|v| (1..=u64::from(MAX_DIMENSION)).contains(&v)),
                format!("an integer between 1 and {}", MAX_DIMENSION),
            ),
            Self::Steps => (
                value.as_u64().is_some_and(|v| (1..=u64::from(MAX_STEPS)).contains(&v)),
                format!("an integer between 1 and {}", MAX_STEPS),
            ),
            Self::Seed => (value.is_u64(), "a non-negative integer".to_string()),
            Self::Cfg => (
                value.as_f64().is_some_and(|v| v.is_finite() && v >= 0.0),
                "a non-negative number".to_string(),
            ),
            Self::Strength => (
                value.as_f64().is_some_and(|v| (0.0..=1.0).contains(&v)),
                "a number between 0 and 1".to_string(),
            ),
        };
        if valid {
            Ok(())
        } else {
            Err(invalid(self.as_str(), format!("{} must be {}, got {}", self, expected, value)))
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown parameter: {}", s))
    }
}

/// One node input a parameter is written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTarget {
    pub node: NodeId,
    pub input: String,
}

/// Maps each exposed parameter to the inputs that carry it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBindings(BTreeMap<ParamName, Vec<InputTarget>>);

impl ParameterBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node.input` as a target of `name`.
    pub fn bind(&mut self, name: ParamName, node: NodeId, input: &str) {
        self.0.entry(name).or_default().push(InputTarget { node, input: input.to_string() });
    }

    pub fn targets(&self, name: ParamName) -> &[InputTarget] {
        self.0.get(&name).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, name: ParamName) -> bool {
        self.0.contains_key(&name)
    }

    /// Bound parameters in name order.
    pub fn names(&self) -> impl Iterator<Item = ParamName> + '_ {
        self.0.keys().copied()
    }
}

/// A validated graph with its output nodes and parameter bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltWorkflow {
    graph: WorkflowGraph,
    outputs: Vec<NodeId>,
    bindings: ParameterBindings,
}

impl BuiltWorkflow {
    /// Wraps a graph after checking its structure and bindings.
    ///
    /// # Errors
    /// A `Workflow` error with reason `INVALID_CONFIG` on a structural defect.
    pub fn new(graph: WorkflowGraph, outputs: Vec<NodeId>, bindings: ParameterBindings) -> Result<Self> {
        let workflow = Self { graph, outputs, bindings };
        workflow.validate()?;
        Ok(workflow)
    }

    /// Re-checks the graph and every binding target.
    pub fn validate(&self) -> Result<()> {
        self.graph.validate(&self.outputs)?;
        for name in self.bindings.names() {
            for target in self.bindings.targets(name) {
                let exists = self.graph.get(target.node).is_some_and(|n| n.input(&target.input).is_some());
                if !exists {
                    return Err(GraphError::MissingBindingTarget {
                        node: target.node,
                        input: target.input.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn bindings(&self) -> &ParameterBindings {
        &self.bindings
    }

    pub fn into_graph(self) -> WorkflowGraph {
        self.graph
    }

    /// Current value of a bound parameter, read from its first target.
    pub fn parameter(&self, name: ParamName) -> Option<&Value> {
        let target = self.bindings.targets(name).first()?;
        self.graph.get(target.node)?.value(&target.input)
    }

    /// Overwrites every input bound to `name`.
    ///
    /// # Errors
    /// `INVALID_PARAMS` when this workflow does not expose `name` or `value`
    /// fails [`ParamName::check`]; the graph is left untouched.
    pub fn set_parameter(&mut self, name: ParamName, value: impl Into<Value>) -> Result<()> {
        let targets = self.bindings.targets(name);
        if targets.is_empty() {
            return Err(WorkflowError::new(
                WorkflowReason::InvalidParams,
                format!("Parameter {} is not exposed by this workflow", name),
            )
            .with_detail("parameter", name.as_str())
            .into());
        }

        let value = value.into();
        name.check(&value)?;
        for target in targets {
            if let Some(node) = self.graph.get_mut(target.node) {
                node.inputs.insert(target.input.clone(), Input::Value(value.clone()));
            }
        }
        Ok(())
    }

    /// The prompt payload submitted to the backend.
    pub fn to_prompt(&self) -> Value {
        serde_json::to_value(&self.graph).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::graph::Node;
    use serde_json::json;

    fn workflow() -> BuiltWorkflow {
        let mut graph = WorkflowGraph::new();
        let encode = graph.add(Node::new("CLIPTextEncodeFlux", "Prompt").with("clip_l", "a").with("t5xxl", "a"));
        let save = graph.add(Node::new("SaveImage", "Save").link("images", encode, 0));
        let mut bindings = ParameterBindings::new();
        bindings.bind(ParamName::Prompt, encode, "clip_l");
        bindings.bind(ParamName::Prompt, encode, "t5xxl");
        BuiltWorkflow::new(graph, vec![save], bindings).unwrap()
    }

    #[test]
    fn test_set_parameter_updates_every_target() {
        let mut workflow = workflow();
        workflow.set_parameter(ParamName::Prompt, "a cat").unwrap();

        let node = workflow.graph().get(NodeId::new(1)).unwrap();
        assert_eq!(node.value("clip_l"), Some(&json!("a cat")));
        assert_eq!(node.value("t5xxl"), Some(&json!("a cat")));
        assert_eq!(workflow.parameter(ParamName::Prompt), Some(&json!("a cat")));
    }

    #[test]
    fn test_unbound_parameter_rejected() {
        let mut workflow = workflow();
        let err = workflow.set_parameter(ParamName::Seed, 1).unwrap_err();
        assert_eq!(err.reason_code(), "INVALID_PARAMS");
        assert_eq!(err.detail("parameter"), Some(&json!("seed")));
        assert_eq!(workflow.parameter(ParamName::Seed), None);
    }

    fn sampler_workflow() -> BuiltWorkflow {
        let mut graph = WorkflowGraph::new();
        let sampler = graph.add(
            Node::new("KSampler", "KSampler")
                .with("width", 1024)
                .with("steps", 20)
                .with("cfg", 7.0)
                .with("denoise", 1.0)
                .with("sampler_name", "euler"),
        );
        let mut bindings = ParameterBindings::new();
        bindings.bind(ParamName::Width, sampler, "width");
        bindings.bind(ParamName::Steps, sampler, "steps");
        bindings.bind(ParamName::Cfg, sampler, "cfg");
        bindings.bind(ParamName::Strength, sampler, "denoise");
        bindings.bind(ParamName::SamplerName, sampler, "sampler_name");
        BuiltWorkflow::new(graph, vec![sampler], bindings).unwrap()
    }

    #[test]
    fn test_set_parameter_rejects_invalid_values() {
        let mut workflow = sampler_workflow();
        let cases = [
            (ParamName::Width, json!(0)),
            (ParamName::Width, json!(MAX_DIMENSION + 1)),
            (ParamName::Width, json!(512.5)),
            (ParamName::Steps, json!("abc")),
            (ParamName::Steps, json!(-3)),
            (ParamName::Cfg, json!(-1.0)),
            (ParamName::Cfg, json!("high")),
            (ParamName::Strength, json!(1.5)),
            (ParamName::SamplerName, json!("")),
            (ParamName::SamplerName, json!(3)),
        ];
        for (name, value) in cases {
            let err = workflow.set_parameter(name, value.clone()).unwrap_err();
            assert_eq!(err.reason_code(), "INVALID_PARAMS", "{} = {}", name, value);
            assert_eq!(err.detail("field"), Some(&json!(name.as_str())));
        }
        assert_eq!(workflow, sampler_workflow());
    }

    #[test]
    fn test_set_parameter_accepts_valid_values() {
        let mut workflow = sampler_workflow();
        workflow.set_parameter(ParamName::Width, 768).unwrap();
        workflow.set_parameter(ParamName::Steps, 30).unwrap();
        workflow.set_parameter(ParamName::Cfg, 5).unwrap();
        workflow.set_parameter(ParamName::Strength, 0.4).unwrap();
        workflow.set_parameter(ParamName::SamplerName, "dpmpp_2m").unwrap();

        assert_eq!(workflow.parameter(ParamName::Width), Some(&json!(768)));
        assert_eq!(workflow.parameter(ParamName::Cfg), Some(&json!(5)));
        assert_eq!(workflow.parameter(ParamName::Strength), Some(&json!(0.4)));
    }

    #[test]
    fn test_binding_to_missing_input_rejected() {
        let mut graph = WorkflowGraph::new();
        let save = graph.add(Node::new("SaveImage", "Save"));
        let mut bindings = ParameterBindings::new();
        bindings.bind(ParamName::Width, save, "width");
        let err = BuiltWorkflow::new(graph, vec![save], bindings).unwrap_err();
        assert_eq!(err.reason_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_param_name_parse() {
        assert_eq!("samplerName".parse::<ParamName>(), Ok(ParamName::SamplerName));
        assert!("sampler_name".parse::<ParamName>().is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(workflow()).unwrap();
        assert_eq!(value["outputs"], json!(["2"]));
        assert_eq!(value["bindings"]["prompt"][0], json!({"node": "1", "input": "clip_l"}));
        assert_eq!(value["graph"]["2"]["class_type"], "SaveImage");
    }
}
