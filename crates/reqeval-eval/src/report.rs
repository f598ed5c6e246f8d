//! Evaluation reports

use indexmap::IndexMap;
use reqeval_model::{RequirementId, RequirementSetType, SetId};
use serde::Serialize;

/// Outcome of one requirement inside a set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementResult {
    pub id: RequirementId,
    pub name: String,
    pub satisfied: bool,
    /// Error message when evaluation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of a requirement set and everything below it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetReport {
    pub id: SetId,
    pub name: String,
    pub set_type: RequirementSetType,
    pub satisfied: bool,
    pub requirements: Vec<RequirementResult>,
    pub children: Vec<SetReport>,
    /// The set was already visited in this traversal; this node is a stub
    /// reporting `satisfied = true` without details
    pub revisited: bool,
}

impl SetReport {
    /// Stub for a set reached a second time
    pub fn revisited(id: SetId, name: impl Into<String>, set_type: RequirementSetType) -> Self {
        Self {
            id,
            name: name.into(),
            set_type,
            satisfied: true,
            requirements: Vec::new(),
            children: Vec::new(),
            revisited: true,
        }
    }

    /// Failed requirements, depth first: own requirements before children
    pub fn failed_requirements(&self) -> FailedRequirements<'_> {
        FailedRequirements {
            stack: vec![self],
            current: Default::default(),
        }
    }

    /// Number of sets actually evaluated (stubs excluded)
    pub fn visit_count(&self) -> usize {
        if self.revisited {
            return 0;
        }
        1 + self.children.iter().map(SetReport::visit_count).sum::<usize>()
    }

    /// Find the evaluated node of a set
    pub fn find(&self, id: SetId) -> Option<&SetReport> {
        if self.id == id && !self.revisited {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Satisfaction of every evaluated requirement, in traversal order
    pub fn requirement_status(&self) -> IndexMap<RequirementId, bool> {
        let mut status = IndexMap::new();
        self.walk(&mut |report| {
            for requirement in &report.requirements {
                status.entry(requirement.id).or_insert(requirement.satisfied);
            }
        });
        status
    }

    /// Satisfaction of every evaluated set, in traversal order
    pub fn set_status(&self) -> IndexMap<SetId, bool> {
        let mut status = IndexMap::new();
        self.walk(&mut |report| {
            status.entry(report.id).or_insert(report.satisfied);
        });
        status
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SetReport)) {
        if self.revisited {
            return;
        }
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Iterator returned by `SetReport::failed_requirements`
#[derive(Debug, Clone)]
pub struct FailedRequirements<'a> {
    stack: Vec<&'a SetReport>,
    current: std::slice::Iter<'a, RequirementResult>,
}

impl<'a> Iterator for FailedRequirements<'a> {
    type Item = &'a RequirementResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(result) = self.current.by_ref().find(|r| !r.satisfied) {
                return Some(result);
            }
            let report = self.stack.pop()?;
            self.stack.extend(report.children.iter().rev());
            self.current = report.requirements.iter();
        }
    }
}
