use fathom_base::{err, Level, LogScale, Result};

// The frontend's textual contract: `~` stands for the default log-scale,
// `#` for the maximum usable level, and every line gains a
// `<line_number> 0 ` prefix before parsing proper.

pub fn preprocess(
    source: &str,
    default_log_scale: LogScale,
    max_usable_level: Level,
) -> Result<String> {
    let substituted = source
        .replace('~', &default_log_scale.value().to_string())
        .replace('#', &max_usable_level.value().to_string());
    let mut linum = -1i64;
    let mut result = String::new();
    for line in substituted.split_inclusive('\n') {
        // A trailing fragment with no newline passes through unprefixed.
        if line.ends_with('\n') {
            linum += 1;
            result.push_str(&format!("{} 0 ", linum));
        }
        result.push_str(line);
    }
    if linum < 1 {
        return Err(err("empty frontend input"));
    }
    Ok(result)
}
