//! Outbound prompt construction. Pure string building, no I/O.

use crate::assignment::Assignment;

pub const REVIEW_APPROVED: &str = "Looks good to me!";
pub const REVIEW_REJECTED: &str = "Code needs more work.";

/// What gets sent, and what the student sees for it in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub display: String,
    pub payload: String,
}

pub fn tutor_instructions(assignment: &Assignment) -> String {
    let item = assignment.current_item();
    format!(
        "You are assisting a student with their project as a tutor. \
         The project is \"{}\" and the task is \"{}\". The requirements are: \"{}\". \
         You must provide guidance and help the student understand the concepts without giving direct answers. \
         Avoid giving a complete solution directly, but use helpful examples and explanations to teach the student.",
        assignment.project_name(),
        item.title(),
        item.requirements(),
    )
}

/// Tutoring prompt for `task`. An empty `context` leaves the bare task as the user message.
pub fn compose_tutoring(assignment: &Assignment, task: &str, context: &str) -> ComposedPrompt {
    let user = if context.is_empty() {
        task.to_string()
    } else {
        format!("{}\n{}", task, context)
    };
    ComposedPrompt {
        display: task.to_string(),
        payload: format!(
            "Your instructions: {} User message: {}",
            tutor_instructions(assignment),
            user
        ),
    }
}

/// Ask the backend to judge `code` against the ticket named `title`.
///
/// A title that is not in the project still produces a prompt, with empty
/// requirements, so the check is never blocked.
pub fn compose_review(assignment: &Assignment, title: &str, code: &str) -> ComposedPrompt {
    let requirements = match assignment.find_item(title) {
        Some(item) => item.requirements.as_str(),
        None => {
            tracing::warn!("Checking code against unknown ticket '{}'", title);
            ""
        }
    };

    ComposedPrompt {
        display: format!(
            "Checking Code | Ticket: {} | Ticket Requirements: {}",
            title, requirements
        ),
        payload: format!(
            "You are helping with the project \"{}\" on the ticket \"{}\". \
             The ticket requirements are \"{}\". Please review the following code. \
             If the code meets the ticket requirements, say '{}'. \
             If the code does not meet the ticket requirements, say '{}' and provide feedback. :\n{}",
            assignment.project_name(),
            title,
            requirements,
            REVIEW_APPROVED,
            REVIEW_REJECTED,
            code
        ),
    }
}

/// Greeting shown once the view is ready.
pub fn welcome(assignment: &Assignment) -> String {
    let (name, description) = assignment
        .project()
        .map(|p| (p.name.as_str(), p.description.as_str()))
        .unwrap_or(("", ""));
    format!(
        "👋 Hello, I'm Projexity AI, here to assist you.\n\
         📂 **Project**: *{name}*\n\
         📝 **Description**: {description}\n\
         ✅ **When you're ready**: Click the \"Check Code\" button when you feel you're finished, \
         and I'll let you know if you're good to move on to the next ticket!\n\
         🔍 Please choose the ticket you are currently working on at the bottom, so I can help if you get stuck!\n\
         🚀 Let's get started!"
    )
}
