//! # 终端输出
//!
//! 状态行统一带前缀：`[OK]` `[ERR]` `[WARN]` `[*]` `[SKIP]` `[DONE]`，
//! 流程步骤为 `[i/n]`。错误写到 stderr，其余写到 stdout。
//!
//! ## 依赖关系
//! - 被 `commands/`, `solver/` 使用
//! - 使用 `colored` crate

use colored::Colorize;

pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 跳过的扫描点、已存在的结果
pub fn print_skip(msg: &str) {
    println!("{} {}", "[SKIP]".dimmed(), msg);
}

pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 流程步骤 `[i/n] msg`
pub fn print_step(step: usize, total: usize, msg: &str) {
    println!(
        "\n{} {}",
        format!("[{}/{}]", step, total).cyan().bold(),
        msg.bold()
    );
}

/// 标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}
