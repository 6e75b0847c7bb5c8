//! The project a student is working on and the ticket currently in focus.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::config::ProjectConfig;
use crate::error::TutorResult;

const BUILTIN_CATALOG: &str = include_str!("../assets/projects.yaml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub title: String,
    pub requirements: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    #[serde(alias = "tickets")]
    pub items: Vec<WorkItem>,
}

impl Project {
    pub fn find_item(&self, title: &str) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.title == title)
    }
}

/// Projects keyed by repository id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ProjectCatalog {
    projects: HashMap<String, Project>,
}

impl ProjectCatalog {
    pub fn builtin() -> TutorResult<Self> {
        Self::parse(BUILTIN_CATALOG)
    }

    pub fn parse(yaml: &str) -> TutorResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> TutorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn get(&self, repo_id: &str) -> Option<&Project> {
        self.projects.get(repo_id)
    }
}

/// Ticket the prompts are bound to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurrentItem<'a> {
    Selected(&'a WorkItem),
    /// No project could be loaded.
    NoneSelected,
}

impl<'a> CurrentItem<'a> {
    pub fn title(&self) -> &'a str {
        match self {
            CurrentItem::Selected(item) => &item.title,
            CurrentItem::NoneSelected => "",
        }
    }

    pub fn requirements(&self) -> &'a str {
        match self {
            CurrentItem::Selected(item) => &item.requirements,
            CurrentItem::NoneSelected => "",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assignment {
    project: Option<Project>,
    current: usize,
}

impl Assignment {
    pub fn new(project: Option<Project>) -> Self {
        Self {
            project,
            current: 0,
        }
    }

    /// Resolve the active project once at startup.
    pub fn load(config: &ProjectConfig) -> TutorResult<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => ProjectCatalog::from_file(path)?,
            None => ProjectCatalog::builtin()?,
        };

        let Some(repo_id) = config.repo_id.as_deref() else {
            tracing::error!("REPO_ID is not set, no project loaded");
            return Ok(Self::new(None));
        };

        let project = catalog.get(repo_id).cloned();
        match &project {
            Some(p) => tracing::info!("Loaded project '{}' ({} tickets)", p.name, p.items.len()),
            None => tracing::error!("No project registered for repo id {}", repo_id),
        }
        Ok(Self::new(project))
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn project_name(&self) -> &str {
        self.project.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }

    pub fn titles(&self) -> Vec<String> {
        self.project
            .iter()
            .flat_map(|p| p.items.iter().map(|item| item.title.clone()))
            .collect()
    }

    pub fn find_item(&self, title: &str) -> Option<&WorkItem> {
        self.project.as_ref().and_then(|p| p.find_item(title))
    }

    /// Switch to the ticket named `title`. Unknown titles leave the selection alone.
    pub fn select_item(&mut self, title: &str) -> bool {
        let position = self
            .project
            .as_ref()
            .and_then(|p| p.items.iter().position(|item| item.title == title));

        match position {
            Some(index) => {
                self.current = index;
                true
            }
            None => {
                tracing::debug!("Ignoring selection of unknown ticket '{}'", title);
                false
            }
        }
    }

    pub fn current_item(&self) -> CurrentItem<'_> {
        self.project
            .as_ref()
            .and_then(|p| p.items.get(self.current))
            .map(CurrentItem::Selected)
            .unwrap_or(CurrentItem::NoneSelected)
    }
}
