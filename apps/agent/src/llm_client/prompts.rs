// Prompt templates for cover-letter drafting.

pub const COVER_LETTER_PROMPT_TEMPLATE: &str = "Optimize applicant resume and generate a short \
    cover letter (3 bullets + 3-line intro) for job: {title} at {company}. \
    Base resume: (local file: {resume_path})";

pub fn cover_letter_prompt(title: &str, company: &str, resume_path: &str) -> String {
    COVER_LETTER_PROMPT_TEMPLATE
        .replace("{title}", title)
        .replace("{company}", company)
        .replace("{resume_path}", resume_path)
}
