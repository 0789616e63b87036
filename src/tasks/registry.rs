/// Task registry built from declarative test metadata
/// Turns an ordered feed of annotations into the task list the game front end
/// shows, merging grouped tests into one task and dropping unordered classes.
use crate::config::types::{GraderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Group number meaning "not grouped"
pub const UNGROUPED: i32 = -1;

/// One annotated test method in the registry feed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskAnnotation {
    /// Fully-qualified class name, e.g. `AzureProjectTest.StorageAccountTest`
    pub class_name: String,
    pub method_name: String,
    /// Display order of the class; `None` excludes the class from the registry
    pub class_order: Option<i32>,
    pub instruction: String,
    pub time_limit: u32,
    pub reward: u32,
    /// Tests of one class sharing a group number form one task
    pub group_number: i32,
}

impl TaskAnnotation {
    pub fn fully_qualified_name(&self) -> String {
        format!("{}.{}", self.class_name, self.method_name)
    }
}

/// A runnable unit of grading as presented to the player
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    #[serde(rename = "gameClassOrder")]
    pub group_order: i32,
    pub name: String,
    #[serde(rename = "tests")]
    pub member_test_names: Vec<String>,
    pub instruction: String,
    #[serde(rename = "filter")]
    pub filter_expression: String,
    pub reward: u32,
    pub time_limit: u32,
}

impl TaskDescriptor {
    fn standalone(annotation: &TaskAnnotation, order: i32) -> Self {
        let fqn = annotation.fully_qualified_name();
        Self {
            group_order: order,
            name: fqn.clone(),
            filter_expression: format!("test={}", fqn),
            member_test_names: vec![fqn],
            instruction: annotation.instruction.clone(),
            reward: annotation.reward,
            time_limit: annotation.time_limit,
        }
    }

    fn grouped(members: &[&TaskAnnotation], order: i32) -> Result<Self> {
        let names: Vec<String> = members.iter().map(|a| a.fully_qualified_name()).collect();
        let filter_expression = names
            .iter()
            .map(|n| format!("test==\"{}\"", n))
            .collect::<Vec<_>>()
            .join("||");

        let name = names.join(" ");
        let reward = checked_total(members, |a| a.reward)
            .ok_or_else(|| GraderError::Config(format!("reward overflows for task {}", name)))?;
        let time_limit = checked_total(members, |a| a.time_limit).ok_or_else(|| {
            GraderError::Config(format!("time limit overflows for task {}", name))
        })?;

        Ok(Self {
            group_order: order,
            name,
            filter_expression,
            instruction: members.iter().map(|a| a.instruction.as_str()).collect(),
            reward,
            time_limit,
            member_test_names: names,
        })
    }

    fn first_member(&self) -> &str {
        self.member_test_names
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

fn checked_total<F>(members: &[&TaskAnnotation], field: F) -> Option<u32>
where
    F: Fn(&TaskAnnotation) -> u32,
{
    members
        .iter()
        .try_fold(0u32, |total, &member| total.checked_add(field(member)))
}

/// Immutable, ordered set of task descriptors with name lookup
#[derive(Clone, Debug, Default)]
pub struct TaskRegistry {
    tasks: Vec<TaskDescriptor>,
    by_name: HashMap<String, usize>,
}

impl TaskRegistry {
    /// Build the registry from an ordered annotation feed
    pub fn from_annotations(feed: &[TaskAnnotation]) -> Result<Self> {
        let mut tasks = Vec::new();

        for class in classes_in_order(feed) {
            let Some(order) = class[0].class_order else {
                log::debug!(
                    "Skipping class {} without order metadata",
                    class[0].class_name
                );
                continue;
            };

            let mut groups: Vec<(i32, Vec<&TaskAnnotation>)> = Vec::new();
            for &annotation in &class {
                if annotation.group_number == UNGROUPED {
                    tasks.push(TaskDescriptor::standalone(annotation, order));
                    continue;
                }
                match groups.iter_mut().find(|(n, _)| *n == annotation.group_number) {
                    Some((_, members)) => members.push(annotation),
                    None => groups.push((annotation.group_number, vec![annotation])),
                }
            }
            for (_, members) in &groups {
                tasks.push(TaskDescriptor::grouped(members, order)?);
            }
        }

        tasks.sort_by(|a, b| {
            a.group_order
                .cmp(&b.group_order)
                .then_with(|| a.first_member().cmp(b.first_member()))
        });

        let mut by_name = HashMap::with_capacity(tasks.len());
        for (index, task) in tasks.iter().enumerate() {
            if by_name.insert(task.name.clone(), index).is_some() {
                return Err(GraderError::Config(format!(
                    "duplicate task name in registry: {}",
                    task.name
                )));
            }
        }

        Ok(Self { tasks, by_name })
    }

    /// Registry over the built-in Azure project battery
    pub fn builtin() -> Result<Self> {
        Self::from_annotations(&crate::tasks::catalog::builtin_annotations())
    }

    /// All descriptors, sorted by group order then first member name
    pub fn list(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    /// Exact-match lookup by descriptor name
    pub fn lookup(&self, name: &str) -> Option<&TaskDescriptor> {
        self.by_name.get(name).map(|&i| &self.tasks[i])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Split the feed per class, classes in first-appearance order and members in
/// declaration order
fn classes_in_order(feed: &[TaskAnnotation]) -> Vec<Vec<&TaskAnnotation>> {
    let mut classes: Vec<Vec<&TaskAnnotation>> = Vec::new();
    for annotation in feed {
        match classes
            .iter_mut()
            .find(|c| c[0].class_name == annotation.class_name)
        {
            Some(class) => class.push(annotation),
            None => classes.push(vec![annotation]),
        }
    }
    classes
}
