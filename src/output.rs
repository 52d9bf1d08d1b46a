use anyhow::Result;
use console::{Term, style};
use serde::Serialize;

use crate::db::BackfillReport;
use crate::models::Comment;

const WRAP_WIDTH: usize = 72;

pub struct Output {
    term: Term,
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self {
            term: Term::stdout(),
            json,
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let output = serde_json::to_string_pretty(value)?;
        self.term.write_line(&output)?;
        Ok(())
    }

    pub fn comment_created(&self, comment: &Comment) -> Result<()> {
        if self.json {
            return self.print_json(comment);
        }

        self.term.write_line(&format!(
            "{} {}",
            style("Created comment:").green(),
            style(&comment.id).cyan().bold()
        ))?;
        self.print_comment_body(comment)
    }

    pub fn comment_list(&self, comments: &[Comment]) -> Result<()> {
        if self.json {
            return self.print_json(comments);
        }

        if comments.is_empty() {
            self.term.write_line("No comments yet.")?;
            return Ok(());
        }

        for comment in comments {
            self.term.write_line(&format!(
                "{} {} [{} {}]",
                style(&comment.id).cyan().bold(),
                style(&comment.name).bold(),
                style(comment.likes).magenta(),
                if comment.likes == 1 { "like" } else { "likes" }
            ))?;
            self.print_comment_body(comment)?;
            self.term.write_line("")?;
        }
        Ok(())
    }

    pub fn comment_liked(&self, comment: &Comment) -> Result<()> {
        if self.json {
            return self.print_json(comment);
        }

        self.term.write_line(&format!(
            "{} {} ({} total)",
            style("Liked comment:").green(),
            style(&comment.id).cyan().bold(),
            comment.likes
        ))?;
        Ok(())
    }

    fn print_comment_body(&self, comment: &Comment) -> Result<()> {
        for line in textwrap::wrap(&comment.comment, WRAP_WIDTH - 2) {
            self.term.write_line(&format!("  {line}"))?;
        }

        let handles: Vec<String> = [
            ("instagram", &comment.instagram),
            ("twitter", &comment.twitter),
            ("facebook", &comment.facebook),
        ]
        .into_iter()
        .filter_map(|(site, handle)| handle.as_ref().map(|h| format!("{site}: {h}")))
        .collect();

        if !handles.is_empty() {
            self.term
                .write_line(&format!("  {}", style(handles.join(", ")).dim()))?;
        }

        self.term.write_line(&format!(
            "  {}",
            style(comment.created_at.strftime("%Y-%m-%d %H:%M UTC")).dim()
        ))?;
        Ok(())
    }

    pub fn migrated(&self, report: &BackfillReport) -> Result<()> {
        if self.json {
            return self.print_json(report);
        }

        if report.updated == 0 {
            self.term.write_line(&format!(
                "All {} comments already up to date.",
                report.scanned
            ))?;
        } else {
            self.term.write_line(&format!(
                "{} {} of {} comments",
                style("Backfilled likes on").green(),
                style(report.updated).cyan().bold(),
                report.scanned
            ))?;
        }
        Ok(())
    }
}
