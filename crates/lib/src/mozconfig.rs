//! Build configuration rendering.
//!
//! The generated `mozconfig` is a fixed template with a handful of values
//! substituted from the manifest. Identical inputs render identical bytes, so
//! its hash can decide whether a previous build is still current.

use crate::consts::APP_NAME;
use crate::manifest::Manifest;

const TEMPLATE: &str = "\
# Generated by warpfox for {package}. Changes are overwritten on every run.

ac_add_options --enable-application=browser
ac_add_options --enable-bootstrap

# ccache
ac_add_options --with-ccache
ac_add_options --with-branding=browser/branding/unofficial

MOZ_APP_NAME={app_name}
";

/// Render the mozconfig for a package.
pub fn render(manifest: &Manifest) -> String {
  TEMPLATE
    .replace("{app_name}", &app_name(manifest))
    .replace("{package}", &single_line(&manifest.to_string()))
}

/// `MOZ_APP_NAME` value: the manifest name lowercased with anything outside
/// `[a-z0-9]` dropped, or `warpfox` when nothing usable remains.
pub fn app_name(manifest: &Manifest) -> String {
  let name: String = manifest
    .name
    .as_deref()
    .unwrap_or_default()
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_lowercase())
    .collect();

  if name.is_empty() { APP_NAME.to_string() } else { name }
}

fn single_line(text: &str) -> String {
  text.lines().collect::<Vec<_>>().join(" ")
}
