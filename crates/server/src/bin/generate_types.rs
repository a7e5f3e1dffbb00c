//! Write the TypeScript declarations shared with the frontend.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use db::models::{
    admin_log::{AdminLog, AdminLogWithAdmin},
    child::{Child, ChildData, Gender, UpsertChild},
    conversation::{Conversation, ConversationWithPreview, CreateConversation},
    message::{ChatMessage, MessageRole},
    tip::{Tip, TipPayload},
    user::{UpdateProfile, UserProfile, UserRole, UserSummary},
};
use server::routes::{health::HealthStatus, messages::CreateMessagePayload};
use services::services::{
    admin::{AdminStats, UserActivityStats, UserDetails},
    auth::{AuthResponse, LoginRequest, SignupRequest, UpdateAccountRequest, VerifyResponse},
    document_import::ImportReport,
};
use ts_rs::TS;
use utils::{jwt::TokenClaims, response::ApiResponse};

#[derive(Debug, Parser)]
#[command(name = "generate-types")]
struct Args {
    /// Output file; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn declarations() -> Vec<String> {
    vec![
        ApiResponse::<()>::decl(),
        TokenClaims::decl(),
        UserRole::decl(),
        UserProfile::decl(),
        UserSummary::decl(),
        UpdateProfile::decl(),
        SignupRequest::decl(),
        LoginRequest::decl(),
        UpdateAccountRequest::decl(),
        AuthResponse::decl(),
        VerifyResponse::decl(),
        Gender::decl(),
        Child::decl(),
        ChildData::decl(),
        UpsertChild::decl(),
        Tip::decl(),
        TipPayload::decl(),
        Conversation::decl(),
        ConversationWithPreview::decl(),
        CreateConversation::decl(),
        MessageRole::decl(),
        ChatMessage::decl(),
        CreateMessagePayload::decl(),
        AdminStats::decl(),
        UserActivityStats::decl(),
        UserDetails::decl(),
        AdminLog::decl(),
        AdminLogWithAdmin::decl(),
        ImportReport::decl(),
        HealthStatus::decl(),
    ]
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut output = String::from("// Generated by `generate-types`. Do not edit.\n\n");
    for decl in declarations() {
        output.push_str("export ");
        output.push_str(&decl);
        output.push_str("\n\n");
    }

    match args.output {
        Some(path) => {
            std::fs::write(&path, output)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{output}"),
    }
    Ok(())
}
