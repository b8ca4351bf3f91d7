use std::collections::HashMap;
use std::sync::Arc;

use super::error::WorkflowError;
use super::stage::WorkflowStage;
use super::status::StagePhase;

/// Configured stages, addressable by operation name
pub struct StageRegistry {
    stages: Vec<Arc<dyn WorkflowStage>>,
    by_name: HashMap<String, usize>,
}

impl StageRegistry {
    /// Fails on an empty or duplicate operation name
    pub fn new(stages: Vec<Arc<dyn WorkflowStage>>) -> Result<Self, WorkflowError> {
        let mut by_name = HashMap::with_capacity(stages.len());

        for (index, stage) in stages.iter().enumerate() {
            let name = stage.operation_name();
            if name.trim().is_empty() {
                return Err(WorkflowError::EmptyStageName);
            }
            if by_name.insert(name.to_string(), index).is_some() {
                return Err(WorkflowError::DuplicateStage(name.to_string()));
            }
        }

        Ok(Self { stages, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn WorkflowStage>> {
        self.by_name.get(name).and_then(|&index| self.stages.get(index))
    }

    pub fn for_phase(&self, phase: StagePhase) -> Option<&Arc<dyn WorkflowStage>> {
        self.stages.iter().find(|stage| stage.phase() == phase)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn WorkflowStage>> {
        self.stages.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.operation_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.names())
            .finish()
    }
}
