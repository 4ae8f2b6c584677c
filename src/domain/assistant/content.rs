//! Resume text shaping and deterministic fallbacks for model output

use serde_json::{json, Value};

/// Minimum number of characters an uploaded resume must yield to be analyzed
pub const MIN_EXTRACTED_TEXT_LEN: usize = 10;

/// Flatten structured resume data into labelled plain text
pub fn format_resume_for_analysis(resume: &Value) -> String {
    let mut text = String::new();
    let info = &resume["personalInfo"];

    text.push_str("PERSONAL INFORMATION:\n");
    for (label, field) in [
        ("Name", "fullName"),
        ("Email", "email"),
        ("Phone", "phone"),
        ("City", "city"),
    ] {
        text.push_str(&format!("{}: {}\n", label, str_or(&info[field], "N/A")));
    }
    for (label, field) in [("LinkedIn", "linkedin"), ("Portfolio", "portfolio")] {
        if let Some(value) = info[field].as_str().filter(|v| !v.is_empty()) {
            text.push_str(&format!("{}: {}\n", label, value));
        }
    }
    text.push('\n');

    if let Some(summary) = resume["summary"].as_str().filter(|s| !s.is_empty()) {
        text.push_str(&format!("PROFESSIONAL SUMMARY:\n{}\n\n", summary));
    }

    if let Some(education) = non_empty_array(&resume["education"]) {
        text.push_str("EDUCATION:\n");
        for edu in education {
            text.push_str(&format!(
                "- {} from {} ({} - {})",
                str_or(&edu["degree"], ""),
                str_or(&edu["institution"], ""),
                str_or(&edu["startDate"], ""),
                str_or(&edu["endDate"], "")
            ));
            if let Some(cgpa) = scalar_text(&edu["cgpa"]) {
                text.push_str(&format!(" - CGPA: {}", cgpa));
            }
            text.push('\n');
        }
        text.push('\n');
    }

    if let Some(experience) = non_empty_array(&resume["experience"]) {
        text.push_str("WORK EXPERIENCE:\n");
        for exp in experience {
            text.push_str(&format!(
                "{} at {} ({} - {})\n",
                str_or(&exp["title"], ""),
                str_or(&exp["company"], ""),
                str_or(&exp["startDate"], ""),
                str_or(&exp["endDate"], "")
            ));
            push_bullets(&mut text, &exp["bullets"]);
            text.push('\n');
        }
    }

    if let Some(projects) = non_empty_array(&resume["projects"]) {
        text.push_str("PROJECTS:\n");
        for project in projects {
            text.push_str(&format!("{}\n", str_or(&project["name"], "")));
            if let Some(tech) = project["techStack"].as_str().filter(|t| !t.is_empty()) {
                text.push_str(&format!("Tech: {}\n", tech));
            }
            push_bullets(&mut text, &project["bullets"]);
            text.push('\n');
        }
    }

    let skills = &resume["skills"];
    let skill_groups = [
        ("Technical", &skills["technical"]),
        ("Frameworks", &skills["frameworks"]),
        ("Soft", &skills["soft"]),
    ];
    if skill_groups.iter().any(|(_, v)| non_empty_array(v).is_some()) {
        text.push_str("SKILLS:\n");
        for (label, group) in skill_groups {
            if let Some(items) = non_empty_array(group) {
                let joined: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                text.push_str(&format!("{}: {}\n", label, joined.join(", ")));
            }
        }
        text.push('\n');
    }

    if let Some(certs) = non_empty_array(&resume["certifications"]) {
        text.push_str("CERTIFICATIONS:\n");
        push_bullets(&mut text, &Value::Array(certs.clone()));
    }

    text
}

/// Pull the first `{ ... }` object out of free-form model output
pub fn extract_json_object(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<Value>(&raw[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// Heuristic score for structured resume data when the model reply is unusable
pub fn fallback_form_analysis(resume: &Value, raw: &str) -> Value {
    let mut score: u32 = 50;
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    if resume["personalInfo"]["email"]
        .as_str()
        .is_some_and(|e| e.contains('@'))
    {
        score += 10;
        strengths.push("Valid email address provided");
    }

    if non_empty_array(&resume["experience"]).is_some() {
        score += 15;
        strengths.push("Work experience included");
    } else {
        improvements.push("Add work experience or internships");
    }

    if non_empty_array(&resume["projects"]).is_some() {
        score += 10;
        strengths.push("Projects section included");
    }

    if non_empty_array(&resume["skills"]["technical"]).is_some() {
        score += 10;
        strengths.push("Technical skills listed");
    }

    let score = score.min(100);
    let critical: Vec<&str> = improvements.iter().take(3).copied().collect();

    json!({
        "atsScore": score,
        "overallGrade": grade_for(score),
        "summary": "Analysis completed with basic scoring due to processing limitations.",
        "strengths": strengths,
        "improvements": improvements,
        "criticalIssues": critical,
        "rawAnalysis": raw,
    })
}

/// Generic analysis for uploaded text when the model reply is unusable
pub fn fallback_text_analysis(raw: &str) -> Value {
    json!({
        "atsScore": 60,
        "overallGrade": grade_for(60),
        "summary": "Analysis completed with basic scoring due to processing limitations.",
        "strengths": ["Resume text was readable by the analyzer"],
        "improvements": [
            "Use standard section headings (Experience, Education, Skills)",
            "Quantify achievements with concrete metrics",
            "Mirror keywords from the job description"
        ],
        "criticalIssues": [],
        "rawAnalysis": raw,
    })
}

/// Best-practice analysis for uploads with no extractable text
pub fn scanned_document_analysis(file_name: &str, file_size: usize) -> Value {
    json!({
        "atsScore": 75,
        "overallGrade": grade_for(75),
        "summary": format!(
            "Uploaded resume appears to be scanned/image-based ({}). Modern ATS systems work best with text-based documents. Consider the recommendations below.",
            file_name
        ),
        "note": "Document appears to be image-based or scanned - analysis based on best practices",
        "fileInfo": { "fileName": file_name, "fileSize": file_size },
        "recommendations": [
            "For scanned documents: convert to a text-based PDF before uploading",
            "Alternative: use the form-based resume builder for detailed AI analysis",
            "Ensure your document has selectable text",
            "Consider recreating your resume in a word processor and exporting it"
        ],
    })
}

/// Lightly enhanced copy of the input when generation output is unusable
pub fn enhance_resume_fallback(original: &Value) -> Value {
    let mut technical = array_or_empty(&original["skills"]["technical"]);
    for extra in ["Microsoft Office", "Data Analysis", "Project Management"] {
        technical.push(json!(extra));
    }

    let certifications = non_empty_array(&original["certifications"])
        .cloned()
        .unwrap_or_else(|| vec![json!("Relevant Professional Development")]);

    json!({
        "personalInfo": original.get("personalInfo").cloned().unwrap_or_else(|| json!({})),
        "summary": original["summary"].as_str().filter(|s| !s.is_empty()).unwrap_or(
            "Dynamic professional with proven track record of delivering results and driving innovation. Strong analytical and problem-solving skills with experience in collaborative environments."
        ),
        "education": array_or_empty(&original["education"]),
        "experience": array_or_empty(&original["experience"]),
        "projects": array_or_empty(&original["projects"]),
        "skills": {
            "technical": technical,
            "soft": ["Leadership", "Communication", "Problem-solving", "Teamwork", "Time Management"],
            "frameworks": array_or_empty(&original["skills"]["frameworks"]),
        },
        "certifications": certifications,
        "achievements": array_or_empty(&original["achievements"]),
        "improvements": [
            "Enhanced professional summary with key strengths",
            "Added essential soft skills for ATS optimization",
            "Included standard professional competencies"
        ],
    })
}

/// Combine a generated resume with the user's input. The user's own summary
/// and technical/soft skills always win over generated ones.
pub fn merge_generated_resume(original: &Value, generated: &Value) -> Value {
    let summary = original["summary"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or_default();

    json!({
        "personalInfo": generated.get("personalInfo").cloned().unwrap_or_else(|| json!({})),
        "professionalTitle": generated.get("professionalTitle").cloned().unwrap_or(Value::Null),
        "summary": summary,
        "education": array_or_empty(&generated["education"]),
        "experience": array_or_empty(&generated["experience"]),
        "projects": array_or_empty(&generated["projects"]),
        "skills": {
            "technical": array_or_empty(&original["skills"]["technical"]),
            "soft": array_or_empty(&original["skills"]["soft"]),
            "frameworks": array_or_empty(&generated["skills"]["frameworks"]),
            "cloudDatabasesTech": array_or_empty(&generated["skills"]["cloudDatabasesTech"]),
        },
        "certifications": array_or_empty(&generated["certifications"]),
        "achievements": array_or_empty(&generated["achievements"]),
    })
}

fn grade_for(score: u32) -> &'static str {
    match score {
        90.. => "A",
        80..=89 => "B",
        70..=79 => "C",
        _ => "D",
    }
}

fn str_or<'a>(value: &'a Value, default: &'a str) -> &'a str {
    value.as_str().unwrap_or(default)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_array(value: &Value) -> Option<&Vec<Value>> {
    value.as_array().filter(|items| !items.is_empty())
}

fn array_or_empty(value: &Value) -> Vec<Value> {
    value.as_array().cloned().unwrap_or_default()
}

fn push_bullets(text: &mut String, bullets: &Value) {
    if let Some(items) = non_empty_array(bullets) {
        for bullet in items.iter().filter_map(Value::as_str) {
            text.push_str(&format!("• {}\n", bullet));
        }
    }
}
