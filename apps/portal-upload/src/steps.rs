//! The upload flow, one named step at a time
//!
//! Every failure is wrapped with the step it happened in, so the final
//! error message reads like "step 5 (choose upload category): ...".

use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::{Credentials, PortalConfig};

/// Delay between element lookups while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Launch,
    Navigate,
    Login,
    OpenUploadPage,
    ChooseCategory,
    AttachFile,
    Submit,
    Confirm,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::Launch,
        Step::Navigate,
        Step::Login,
        Step::OpenUploadPage,
        Step::ChooseCategory,
        Step::AttachFile,
        Step::Submit,
        Step::Confirm,
    ];

    /// 1-based position in the flow
    pub fn number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::Launch => "launch browser",
            Step::Navigate => "open portal",
            Step::Login => "log in",
            Step::OpenUploadPage => "open upload page",
            Step::ChooseCategory => "choose upload category",
            Step::AttachFile => "attach file",
            Step::Submit => "submit upload",
            Step::Confirm => "confirm upload",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.name())
    }
}

/// Steps 2 through 8 on an already launched browser page
pub async fn upload(
    page: &Page,
    config: &PortalConfig,
    credentials: &Credentials,
    pdf: &Path,
) -> Result<()> {
    run_step(Step::Navigate, navigate(page, config)).await?;
    run_step(Step::Login, login(page, config, credentials)).await?;
    run_step(Step::OpenUploadPage, open_upload_page(page, config)).await?;
    run_step(Step::ChooseCategory, choose_category(page, config)).await?;
    run_step(Step::AttachFile, attach_file(page, config, pdf)).await?;
    run_step(Step::Submit, submit(page, config)).await?;

    match &config.selectors.confirmation {
        Some(selector) => {
            run_step(Step::Confirm, async {
                wait_for_element(page, selector, config.element_timeout()).await?;
                Ok(())
            })
            .await?
        }
        None => debug!("No confirmation selector configured, skipping {}", Step::Confirm),
    }
    Ok(())
}

/// Log the step, run it, tag any error with the step
pub async fn run_step<T, F>(step: Step, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    info!("Running {}", step);
    let value = fut.await.with_context(|| format!("{} failed", step))?;
    debug!("Finished {}", step);
    Ok(value)
}

#[instrument(skip_all, fields(url = %config.url))]
async fn navigate(page: &Page, config: &PortalConfig) -> Result<()> {
    page.goto(config.url.as_str())
        .await
        .context("Navigation failed")?;
    page.wait_for_navigation()
        .await
        .context("Page did not finish loading")?;
    Ok(())
}

#[instrument(skip_all)]
async fn login(page: &Page, config: &PortalConfig, credentials: &Credentials) -> Result<()> {
    let timeout = config.element_timeout();
    let selectors = &config.selectors;

    let username = wait_for_element(page, &selectors.username, timeout).await?;
    username.click().await.context("Click failed")?;
    username
        .type_str(&credentials.username)
        .await
        .context("Typing username failed")?;

    let password = wait_for_element(page, &selectors.password, timeout).await?;
    password.click().await.context("Click failed")?;
    password
        .type_str(&credentials.password)
        .await
        .context("Typing password failed")?;

    wait_for_element(page, &selectors.login_submit, timeout)
        .await?
        .click()
        .await
        .context("Click failed")?;
    page.wait_for_navigation()
        .await
        .context("Login did not navigate")?;
    Ok(())
}

#[instrument(skip_all)]
async fn open_upload_page(page: &Page, config: &PortalConfig) -> Result<()> {
    wait_for_element(page, &config.selectors.upload_link, config.element_timeout())
        .await?
        .click()
        .await
        .context("Click failed")?;
    // The upload form renders in place; the next step waits for its select
    Ok(())
}

#[instrument(skip_all, fields(category = %config.upload_category))]
async fn choose_category(page: &Page, config: &PortalConfig) -> Result<()> {
    let selector = &config.selectors.category_select;
    wait_for_element(page, selector, config.element_timeout()).await?;

    let selected: bool = page
        .evaluate(select_option_script(selector, &config.upload_category))
        .await
        .context("Failed to run category selection script")?
        .into_value()
        .context("Failed to read category selection result")?;
    if !selected {
        bail!(
            "No option labelled '{}' in {}",
            config.upload_category,
            selector
        );
    }
    Ok(())
}

#[instrument(skip_all, fields(file = %pdf.display()))]
async fn attach_file(page: &Page, config: &PortalConfig, pdf: &Path) -> Result<()> {
    let input =
        wait_for_element(page, &config.selectors.file_input, config.element_timeout()).await?;
    let params = SetFileInputFilesParams::builder()
        .file(pdf.display().to_string())
        .backend_node_id(input.backend_node_id)
        .build()
        .map_err(|e| anyhow!("Failed to build file input params: {}", e))?;
    page.execute(params)
        .await
        .context("Failed to set file input")?;
    Ok(())
}

#[instrument(skip_all)]
async fn submit(page: &Page, config: &PortalConfig) -> Result<()> {
    wait_for_element(page, &config.selectors.upload_submit, config.element_timeout())
        .await?
        .click()
        .await
        .context("Click failed")?;
    page.wait_for_navigation()
        .await
        .context("Upload did not navigate")?;
    Ok(())
}

/// Poll for `selector` until it is attached or `timeout` elapses
pub async fn wait_for_element(page: &Page, selector: &str, timeout: Duration) -> Result<Element> {
    let deadline = Instant::now() + timeout;
    loop {
        match page.find_element(selector).await {
            Ok(element) => return Ok(element),
            Err(e) if Instant::now() >= deadline => {
                return Err(e).with_context(|| {
                    format!("Element not found after {:?}: {}", timeout, selector)
                })
            }
            Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }
}

/// Script that picks the `<option>` whose visible text is `label`.
///
/// Evaluates to `true` when an option was selected. Change events are
/// dispatched so the page's own handlers see the selection.
pub fn select_option_script(selector: &str, label: &str) -> String {
    format!(
        r#"(() => {{
  const select = document.querySelector({selector});
  if (!select) return false;
  const option = Array.from(select.options).find(o => o.text.trim() === {label});
  if (!option) return false;
  select.value = option.value;
  select.dispatchEvent(new Event('input', {{ bubbles: true }}));
  select.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#,
        selector = js_string(selector),
        label = js_string(label.trim()),
    )
}

/// Quote `s` as a JavaScript string literal
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_steps_are_numbered_in_order() {
        let numbers: Vec<usize> = Step::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_step_display() {
        assert_eq!(
            Step::ChooseCategory.to_string(),
            "step 5 (choose upload category)"
        );
        assert_eq!(Step::Launch.to_string(), "step 1 (launch browser)");
    }

    #[test]
    fn test_select_script_quotes_arguments() {
        let script = select_option_script("#fileUploadCategory", "Incoming rollovers");
        assert!(script.contains(r##"document.querySelector("#fileUploadCategory")"##));
        assert!(script.contains(r#"o.text.trim() === "Incoming rollovers""#));
    }

    #[test]
    fn test_select_script_escapes_quotes() {
        let script = select_option_script(r#"select[name="cat"]"#, "Bob's \"IRA\"\n");
        assert!(script.contains(r#"document.querySelector("select[name=\"cat\"]")"#));
        assert!(script.contains(r#"o.text.trim() === "Bob's \"IRA\"""#));
    }

    #[tokio::test]
    async fn test_run_step_tags_errors() {
        let err = run_step::<(), _>(Step::AttachFile, async { bail!("input missing") })
            .await
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.starts_with("step 6 (attach file) failed"));
        assert!(message.contains("input missing"));
    }

    #[tokio::test]
    async fn test_run_step_passes_value_through() {
        let value = run_step(Step::Navigate, async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }
}
