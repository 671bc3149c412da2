//! Command handlers. Each one runs against a restored session.

use std::io::{self, Write};

use anyhow::{bail, Result};
use tracing::warn;

use sortiq_core::config::Config;
use sortiq_core::models::{Priority, ProcessedTask, Registration, SignInCredentials, TaskStatus};
use sortiq_core::{RestoreOutcome, SessionEvent, SessionStore};

use crate::{Command, TasksCommand};

const SIGN_IN_HINT: &str = "Run `sortiq login` to sign in.";

pub async fn run(command: Command, config: &mut Config) -> Result<()> {
    let session = config.build_session()?;
    session.client().events().subscribe(|event| {
        if *event == SessionEvent::Expired {
            eprintln!("Your session has expired. {}", SIGN_IN_HINT);
        }
    });

    match session.restore().await {
        RestoreOutcome::Invalidated => {
            eprintln!("Your saved session is no longer valid.");
        }
        RestoreOutcome::Preserved { error } => {
            eprintln!("Could not verify your session: {}", error);
        }
        RestoreOutcome::NoSession | RestoreOutcome::Restored(_) => {}
    }

    match command {
        Command::Signup {
            email,
            username,
            full_name,
        } => signup(&session, config, email, username, full_name).await,
        Command::Login { email } => login(&session, config, email).await,
        Command::Logout => {
            session.sign_out();
            println!("Signed out.");
            Ok(())
        }
        Command::Whoami => whoami(&session),
        Command::Verify { token } => {
            let user = session.verify_and_login(&token).await?;
            println!("Email verified. Signed in as {}.", user.display_name());
            Ok(())
        }
        Command::Tasks(command) => {
            require_session(&session)?;
            run_tasks(&session, command).await
        }
        Command::Transform { tasks, save, email } => {
            require_session(&session)?;
            transform(&session, tasks, save, email).await
        }
        Command::ApiKey { key } => {
            require_session(&session)?;
            session.client().update_api_key(&key).await?;
            println!("API key updated.");
            Ok(())
        }
    }
}

fn require_session(session: &SessionStore) -> Result<()> {
    if !session.is_authenticated() {
        bail!("Not signed in. {}", SIGN_IN_HINT);
    }
    Ok(())
}

async fn signup(
    session: &SessionStore,
    config: &mut Config,
    email: Option<String>,
    username: Option<String>,
    full_name: Option<String>,
) -> Result<()> {
    let registration = Registration {
        email: prompt_or("Email", email)?,
        username: prompt_or("Username", username)?,
        password: prompt_password()?,
        full_name,
    };

    let user = session.sign_up(&registration).await?;
    remember_email(config, &user.email);
    println!("Welcome, {}!", user.display_name());
    Ok(())
}

async fn login(session: &SessionStore, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt_line("Email")?,
    };
    let password = prompt_password()?;

    let user = session
        .sign_in(&SignInCredentials::new(email, password))
        .await?;
    remember_email(config, &user.email);
    println!("Signed in as {}.", user.display_name());
    Ok(())
}

fn whoami(session: &SessionStore) -> Result<()> {
    let Some(user) = session.current_user() else {
        bail!("Not signed in. {}", SIGN_IN_HINT);
    };
    println!("{} <{}>", user.display_name(), user.email);
    println!("Username: {}", user.username);
    if !user.is_active {
        println!("Account is not active");
    }
    if user.has_api_key() {
        println!("AI API key: configured");
    }
    Ok(())
}

async fn run_tasks(session: &SessionStore, command: TasksCommand) -> Result<()> {
    let client = session.client();
    match command {
        TasksCommand::List => {
            let tasks = client.list_tasks().await?;
            if tasks.is_empty() {
                println!("No saved tasks.");
            }
            for task in tasks {
                let mark = if task.is_completed() { "x" } else { " " };
                println!(
                    "[{}] #{} {} ({}, {})",
                    mark,
                    task.id,
                    task.smart_task,
                    task.priority,
                    task.created_at.format("%Y-%m-%d")
                );
            }
        }
        TasksCommand::Save {
            original,
            smart,
            priority,
        } => {
            let task = ProcessedTask {
                original_task: original,
                smart_task: smart,
                priority: Priority::from_label(&priority),
            };
            let saved = client.save_task(&task).await?;
            println!("Saved task #{}.", saved.id);
        }
        TasksCommand::Delete { id } => {
            client.delete_task(id).await?;
            println!("Deleted task #{}.", id);
        }
        TasksCommand::Status { id, status } => {
            let status = TaskStatus::from_label(&status);
            client.update_task_status(id, &status).await?;
            println!("Task #{} is now {}.", id, status);
        }
    }
    Ok(())
}

async fn transform(session: &SessionStore, tasks: Vec<String>, save: bool, email: bool) -> Result<()> {
    let client = session.client();
    let processed = client.transform_tasks(&tasks).await?;

    for task in &processed {
        println!("- [{}] {}", task.priority, task.smart_task);
        println!("    from: {}", task.original_task);
    }

    if save {
        let results = client.save_tasks(&processed).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        for error in results.iter().filter_map(|r| r.as_ref().err()) {
            warn!(error = %error, "Failed to save task");
        }
        println!("Saved {} of {} tasks.", results.len() - failed, results.len());
    }

    if email {
        client.send_task_result_email(&tasks, &processed).await?;
        println!("Results emailed.");
    }
    Ok(())
}

/// Persist the email for the next sign-in. Only the file is rewritten, so
/// command-line and environment overrides are not saved.
fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());
    let saved = Config::load_file().and_then(|mut file| {
        file.last_email = Some(email.to_string());
        file.save()
    });
    if let Err(e) = saved {
        warn!(error = %e, "Failed to save config");
    }
}

fn prompt_or(label: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt_line(label),
    }
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
