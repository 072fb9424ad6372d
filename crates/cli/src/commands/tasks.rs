//! `acontext tasks`: print a session's task list.

use acontext_config::AppConfig;
use acontext_core::store::SessionStore;
use acontext_core::task::Task;
use uuid::Uuid;

use super::open_store;

pub async fn run(config: &AppConfig, session_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    let tasks = store.fetch_current_tasks(session_id).await.into_result()?;
    print_tasks(&tasks);
    Ok(())
}

pub fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("(no tasks)");
        return;
    }
    for task in tasks {
        println!("- {}", task.render());
    }
}
