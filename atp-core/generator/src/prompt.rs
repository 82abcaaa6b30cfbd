//! 生成提示词

/// 构造测试用例生成提示词
pub fn build_prompt(target_url: &str, custom_instructions: Option<&str>) -> String {
    let request = match custom_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        Some(extra) => format!("Website under test: {}\nFocus: {}", target_url, extra),
        None => format!("Website under test: {}", target_url),
    };

    format!(
        r#"You are a Senior QA Automation Engineer.
Your task is to generate end-to-end test scenarios for the website below.

STRICT OUTPUT RULES:
1. Output MUST be valid, raw JSON only.
2. DO NOT use Markdown formatting (no ```json blocks).
3. DO NOT include explanations or text outside the JSON.
4. WRITE STEPS IN PLAIN ENGLISH. Do not write code (write "Click the 'Submit' button", NOT "page.click('#submit')").
5. Put button labels and expected texts in single quotes, e.g. Click 'Sign in', Verify 'Welcome'.
6. Avoid double quotes inside step strings.

REQUIRED JSON STRUCTURE:
{{
  "testCases": [
    {{
      "title": "Short Descriptive Title",
      "steps": ["Open the home page", "Click 'Login'", "Verify 'Dashboard'"],
      "expectedResult": "What should happen?",
      "priority": "HIGH"
    }}
  ]
}}

Analyze this request and generate 3-5 high-value test cases:
{}
"#,
        request
    )
}
