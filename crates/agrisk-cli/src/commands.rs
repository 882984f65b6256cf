//! Subcommand handlers

use crate::cli::{parse_answer, parse_update};
use agrisk_client::ApiClient;
use agrisk_core::{DataLayer, QueryKey};
use agrisk_intake::Route;
use agrisk_model::{
    AssessmentId, CompletePasswordChangeRequest, CurrentUser, GapFieldBatch, GapFieldUpdate,
    LoginRequest, LoginResponse, NewComment, RecommendationEdit, RiskScoreId, UserId,
};
use anyhow::{bail, Context};
use clap::ArgMatches;
use serde::Serialize;

/// Everything a handler needs
pub(crate) struct Session {
    pub(crate) client: ApiClient,
    pub(crate) data: DataLayer,
    pub(crate) json: bool,
}

impl Session {
    fn print<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text(value));
        }
        Ok(())
    }
}

fn assessment(args: &ArgMatches) -> anyhow::Result<AssessmentId> {
    args.get_one::<u64>("assessment")
        .copied()
        .map(AssessmentId)
        .context("assessment id is required")
}

fn text<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("{name} is required"))
}

pub(crate) async fn login(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    let request = LoginRequest {
        email: text(args, "email")?.to_string(),
        password: text(args, "password")?.to_string(),
    };
    let remember = args.get_flag("remember");

    match session.client.login(&request, remember).await? {
        LoginResponse::Authenticated(_) => {
            println!("Signed in as {}", request.email);
        }
        LoginResponse::NewPasswordRequired { session: challenge } => {
            let Some(new_password) = args.get_one::<String>("new-password") else {
                bail!("a new password is required; rerun with --new-password");
            };
            let change = CompletePasswordChangeRequest {
                email: request.email.clone(),
                session: challenge,
                new_password: new_password.clone(),
            };
            session
                .client
                .complete_password_change(&change, remember)
                .await?;
            println!("Password changed; signed in as {}", request.email);
        }
    }
    if !remember {
        tracing::warn!("tokens kept for this run only; pass --remember to stay signed in");
    }
    Ok(())
}

pub(crate) fn logout(session: &Session) -> anyhow::Result<()> {
    session.client.logout()?;
    println!("Signed out");
    Ok(())
}

pub(crate) async fn assessments(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    if args.get_flag("stats") {
        let stats = session.data.assessment_stats().await?;
        return session.print(&stats, |s| {
            let mut out = format!("{} assessments", s.total);
            for (status, count) in &s.by_status {
                out.push_str(&format!("\n  {status:?}: {count}"));
            }
            out
        });
    }
    let list = session.data.assessments().await?;
    session.print(&list, |list| {
        list.iter()
            .map(|a| format!("{:>6}  {:<14} {}", a.id, format!("{:?}", a.status), a.business_name))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

pub(crate) async fn gaps(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    let id = assessment(args)?;
    let fields = session.data.gap_fields(id).await?;
    session.print(&fields, |fields| {
        fields
            .iter()
            .map(|f| {
                format!(
                    "{:>6}  {:<9} {:<28} {}",
                    f.id,
                    format!("{:?}", f.status),
                    f.label,
                    f.effective_value().unwrap_or("-")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

pub(crate) async fn correct(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    let id = assessment(args)?;
    let updates = args
        .get_many::<String>("updates")
        .context("at least one ID=VALUE is required")?
        .map(|raw| parse_update(raw).map(|(field, value)| GapFieldUpdate::new(field, value)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let _view = session.data.observe(QueryKey::GapFields(id));
    session.data.gap_fields(id).await?;
    let updated = session
        .data
        .update_gap_fields(id, GapFieldBatch::new(updates))
        .await?;
    session.print(&updated, |u| format!("{} field(s) verified", u.len()))
}

pub(crate) async fn intake(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    let id = assessment(args)?;
    let answers = args
        .get_many::<String>("answers")
        .context("at least one FIELD=VALUE is required")?
        .map(String::as_str)
        .map(parse_answer)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut form = session.data.manual_entry(id);
    for (field, value) in answers {
        form.set_answer(&field, value)?;
    }

    if !args.get_flag("submit") {
        form.save_now().await;
        let ready = if form.can_submit() {
            "ready to submit"
        } else {
            "mandatory fields missing"
        };
        println!("{} answer(s) saved; {ready}", form.answers().len());
        return Ok(());
    }

    match form.submit().await? {
        Route::GapResults(assessment) => {
            println!("Submitted; gap detection started for assessment {assessment}");
            println!("Run `agrisk gaps {assessment}` to review the results");
        }
    }
    Ok(())
}

pub(crate) async fn comment(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    let id = assessment(args)?;
    let author = CurrentUser::new(
        UserId(
            args.get_one::<u64>("user-id")
                .copied()
                .context("user id is required")?,
        ),
        text(args, "user-name")?,
    );
    let created = session
        .data
        .add_comment(id, author, NewComment::new(text(args, "body")?))
        .await?;
    session.print(&created, |c| format!("Comment {} posted", c.id))
}

pub(crate) async fn scores(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    let id = assessment(args)?;
    let scores = session.data.risk_scores(id).await?;
    session.print(&scores, |scores| {
        scores
            .iter()
            .map(|s| {
                format!(
                    "{:>6}  {:<14} {:>3} {:<6} {}",
                    s.id,
                    s.category.label(),
                    s.score,
                    format!("{:?}", s.level()),
                    s.recommendation.as_deref().unwrap_or("")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

pub(crate) async fn recommend(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    let id = assessment(args)?;
    let score = args
        .get_one::<u64>("score")
        .copied()
        .map(RiskScoreId)
        .context("score id is required")?;
    let edit = RecommendationEdit::new(text(args, "text")?);
    let updated = session.data.edit_recommendation(id, score, edit).await?;
    session.print(&updated, |s| format!("Recommendation saved on {}", s.category.label()))
}

pub(crate) async fn report(session: &Session, args: &ArgMatches) -> anyhow::Result<()> {
    let id = assessment(args)?;
    let _view = session.data.observe(QueryKey::Report(id));
    if args.get_flag("pdf") {
        let job = session.data.generate_pdf(id).await?;
        tracing::info!(job = %job.job_id, status = ?job.status, "pdf render queued");
    }
    let report = session.data.report(id).await?;
    session.print(&report, |r| {
        let mut out = format!("Overall risk {} for assessment {}", r.overall_score, r.assessment_id);
        for section in r.sections_by_risk() {
            out.push_str(&format!(
                "\n  {:<14} {:>3} {:?}  {}",
                section.category.label(),
                section.score,
                section.level,
                section.summary
            ));
        }
        if let Some(url) = &r.pdf_url {
            out.push_str(&format!("\nPDF: {url}"));
        }
        out
    })
}
