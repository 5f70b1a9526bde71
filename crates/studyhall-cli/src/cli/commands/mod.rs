//! Command implementations.

pub mod answers;
pub mod doctor;
pub mod flags;
pub mod helpers;
pub mod inbox;
pub mod init;
pub mod messages;
pub mod questions;
pub mod reviews;
pub mod trust;
pub mod users;

pub use answers::{run_answers_delete, run_answers_edit, run_answers_list, run_answers_post};
pub use doctor::run_doctor;
pub use flags::{run_flags_file, run_flags_list, run_flags_resolve, run_flags_status};
pub use helpers::{add_fix_hint, open_services};
pub use inbox::run_inbox;
pub use init::run_init;
pub use messages::{run_messages_inbox, run_messages_read, run_messages_send};
pub use questions::{
    run_questions_accept, run_questions_ask, run_questions_delete, run_questions_edit,
    run_questions_list, run_questions_show,
};
pub use reviews::{
    run_reviews_delete, run_reviews_history, run_reviews_latest, run_reviews_list_reviewer,
    run_reviews_list_target, run_reviews_save, run_reviews_show, run_reviews_submit,
    run_reviews_update,
};
pub use trust::{run_trust_add, run_trust_list, run_trust_remove, run_trust_updated, run_trust_view};
pub use users::{
    run_users_grant, run_users_list, run_users_register, run_users_revoke, run_users_show,
};
