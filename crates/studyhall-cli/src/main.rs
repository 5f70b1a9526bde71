//! studyhall - campus Q&A with versioned peer reviews, trusted reviewers and moderation

use anyhow::{bail, Result};
use clap::Parser;
use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use studyhall_cli::cli::commands::{
    add_fix_hint, open_services, run_answers_delete, run_answers_edit, run_answers_list,
    run_answers_post, run_doctor, run_flags_file, run_flags_list, run_flags_resolve,
    run_flags_status, run_inbox, run_init, run_messages_inbox, run_messages_read,
    run_messages_send, run_questions_accept, run_questions_ask, run_questions_delete,
    run_questions_edit, run_questions_list, run_questions_show, run_reviews_delete,
    run_reviews_history, run_reviews_latest, run_reviews_list_reviewer, run_reviews_list_target,
    run_reviews_save, run_reviews_show, run_reviews_submit, run_reviews_update, run_trust_add,
    run_trust_list, run_trust_remove, run_trust_updated, run_trust_view, run_users_grant,
    run_users_list, run_users_register, run_users_revoke, run_users_show,
};
use studyhall_cli::cli::{
    AnswersCommands, Cli, Commands, FlagsCommands, MessagesCommands, QuestionsCommands,
    ReviewsCommands, TrustCommands, UsersCommands,
};
use studyhall_cli::output::OutputFormat;
use studyhall_core::config::Config;
use studyhall_core::core::{CoreContext, Services};
use studyhall_core::identity::resolve_identity;

/// Log filter directive, e.g. `STUDYHALL_LOG=studyhall_core=debug`.
const LOG_ENV: &str = "STUDYHALL_LOG";

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    run(cli).map_err(add_fix_hint)
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> Result<()> {
    let format = cli.output_format();
    let root = env::current_dir()?;
    let config = Config::load(&root)?;
    let db_path = cli.db.unwrap_or_else(|| config.db_path(&root));
    let ctx = CoreContext::with_db_path(&db_path, config.busy_timeout());

    // Only mutating and personal commands need to know who is acting.
    let as_user = cli.as_user;
    let actor = || resolve_identity(as_user.as_deref(), config.default_user.as_deref());

    match cli.command {
        Commands::Init => run_init(&ctx, format),
        Commands::Doctor => run_doctor(&ctx, format),
        Commands::Users(cmd) => users(&open_services(&ctx)?, cmd, &actor, format),
        Commands::Questions(cmd) => questions(&open_services(&ctx)?, cmd, &actor, format),
        Commands::Answers(cmd) => answers(&open_services(&ctx)?, cmd, &actor, format),
        Commands::Reviews(cmd) => reviews(&open_services(&ctx)?, cmd, &actor, format),
        Commands::Trust(cmd) => trust(&open_services(&ctx)?, cmd, &actor()?, format),
        Commands::Flags(cmd) => flags(&open_services(&ctx)?, cmd, &actor, format),
        Commands::Messages(cmd) => messages(&open_services(&ctx)?, cmd, &actor()?, format),
        Commands::Inbox => run_inbox(&open_services(&ctx)?, &actor()?, format),
    }
}

fn users(
    services: &Services,
    cmd: UsersCommands,
    actor: &impl Fn() -> Result<String>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        UsersCommands::Register { username, roles } => {
            run_users_register(services, &actor()?, &username, &roles, format)
        }
        UsersCommands::Show { username } => run_users_show(services, &username, format),
        UsersCommands::List { role } => run_users_list(services, role, format),
        UsersCommands::Grant { username, role } => {
            run_users_grant(services, &actor()?, &username, role, format)
        }
        UsersCommands::Revoke { username, role } => {
            run_users_revoke(services, &actor()?, &username, role, format)
        }
    }
}

fn questions(
    services: &Services,
    cmd: QuestionsCommands,
    actor: &impl Fn() -> Result<String>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        QuestionsCommands::Ask { title, body, tags } => {
            run_questions_ask(services, &actor()?, &title, &body, &tags, format)
        }
        QuestionsCommands::Show { question_id } => {
            run_questions_show(services, question_id, format)
        }
        QuestionsCommands::List { tag, author } => {
            run_questions_list(services, tag.as_deref(), author.as_deref(), format)
        }
        QuestionsCommands::Edit {
            question_id,
            title,
            body,
            tags,
            clear_tags,
        } => {
            // --clear-tags empties the list; no --tag leaves it alone
            let tags = if clear_tags {
                Some(Vec::new())
            } else if tags.is_empty() {
                None
            } else {
                Some(tags)
            };
            run_questions_edit(
                services,
                &actor()?,
                question_id,
                title.as_deref(),
                body.as_deref(),
                tags.as_deref(),
                format,
            )
        }
        QuestionsCommands::Delete { question_id } => {
            run_questions_delete(services, &actor()?, question_id, format)
        }
        QuestionsCommands::Accept {
            question_id,
            answer_id,
        } => run_questions_accept(services, &actor()?, question_id, answer_id, format),
    }
}

fn answers(
    services: &Services,
    cmd: AnswersCommands,
    actor: &impl Fn() -> Result<String>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        AnswersCommands::Post {
            question_id,
            body,
            reply_to,
        } => run_answers_post(services, &actor()?, question_id, &body, reply_to, format),
        AnswersCommands::List { question_id } => run_answers_list(services, question_id, format),
        AnswersCommands::Edit { answer_id, body } => {
            run_answers_edit(services, &actor()?, answer_id, &body, format)
        }
        AnswersCommands::Delete { answer_id } => {
            run_answers_delete(services, &actor()?, answer_id, format)
        }
    }
}

fn reviews(
    services: &Services,
    cmd: ReviewsCommands,
    actor: &impl Fn() -> Result<String>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        ReviewsCommands::Submit {
            target,
            rating,
            comment,
        } => run_reviews_submit(services, &actor()?, target, rating, comment.as_deref(), format),
        ReviewsCommands::Update {
            target,
            rating,
            comment,
        } => run_reviews_update(services, &actor()?, target, rating, comment.as_deref(), format),
        ReviewsCommands::Save {
            target,
            rating,
            comment,
        } => run_reviews_save(services, &actor()?, target, rating, comment.as_deref(), format),
        ReviewsCommands::Show { review_id } => run_reviews_show(services, &review_id, format),
        ReviewsCommands::Latest { target, reviewer } => {
            let reviewer = match reviewer {
                Some(reviewer) => reviewer,
                None => actor()?,
            };
            run_reviews_latest(services, &reviewer, target, format)
        }
        ReviewsCommands::History { target, reviewer } => {
            let reviewer = match reviewer {
                Some(reviewer) => reviewer,
                None => actor()?,
            };
            run_reviews_history(services, &reviewer, target, format)
        }
        ReviewsCommands::List {
            target,
            reviewer,
            trusted,
        } => {
            if let Some(reviewer) = reviewer {
                return run_reviews_list_reviewer(services, &reviewer, format);
            }
            let Some(target) = target else {
                bail!("Give a target (e.g. answer:2002) or --reviewer <name>");
            };
            let student = if trusted { Some(actor()?) } else { None };
            run_reviews_list_target(services, target, student.as_deref(), format)
        }
        ReviewsCommands::Delete { review_id } => {
            run_reviews_delete(services, &actor()?, &review_id, format)
        }
    }
}

fn trust(
    services: &Services,
    cmd: TrustCommands,
    student: &str,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        TrustCommands::Add { reviewer, weight } => {
            run_trust_add(services, student, &reviewer, weight, format)
        }
        TrustCommands::Remove { reviewer } => {
            run_trust_remove(services, student, &reviewer, format)
        }
        TrustCommands::List => run_trust_list(services, student, format),
        TrustCommands::Updated => run_trust_updated(services, student, format),
        TrustCommands::View { reviewer } => run_trust_view(services, student, &reviewer, format),
    }
}

fn flags(
    services: &Services,
    cmd: FlagsCommands,
    actor: &impl Fn() -> Result<String>,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        FlagsCommands::File {
            kind,
            item_id,
            reason,
        } => run_flags_file(services, &actor()?, kind, item_id, &reason, format),
        FlagsCommands::Resolve { kind, item_id } => {
            run_flags_resolve(services, &actor()?, kind, item_id, format)
        }
        FlagsCommands::Status { kind, item_id } => {
            run_flags_status(services, kind, item_id, format)
        }
        FlagsCommands::List { item, kind } => run_flags_list(services, item, kind, format),
    }
}

fn messages(
    services: &Services,
    cmd: MessagesCommands,
    actor: &str,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        MessagesCommands::Send {
            recipient,
            body,
            question,
        } => run_messages_send(services, actor, &recipient, &body, question, format),
        MessagesCommands::Inbox { unread } => run_messages_inbox(services, actor, unread, format),
        MessagesCommands::Read { message_id } => {
            run_messages_read(services, actor, message_id, format)
        }
    }
}
