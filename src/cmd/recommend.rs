//! Rate recommendation command: `takc recommend`.

use takc::rate::{QueryComplexity, recommend};

pub fn cmd_recommend(task_type: &str, data_size: usize, complexity: QueryComplexity) {
    let rate = recommend(task_type, data_size, complexity);
    println!(
        "{} {} ({}x) for {} words of {} data at {} complexity",
        console::style("Recommended rate:").bold(),
        console::style(rate).green(),
        rate.target_ratio(),
        data_size,
        task_type,
        complexity
    );
}
