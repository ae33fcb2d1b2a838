use regex::Regex;
use std::sync::OnceLock;

/// 去掉终端颜色和控制序列（CSI、OSC 以及单字符转义）
pub fn strip_ansi(text: &str) -> String {
    static ANSI_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = ANSI_REGEX.get_or_init(|| {
        Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-_]")
            .expect("ansi pattern is valid")
    });

    re.replace_all(text, "").into_owned()
}
