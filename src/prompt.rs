//! Prompt templates for compression and answering.

/// Task-aware compression preamble. The text to compress is appended after it.
pub fn build_task_prompt(task_description: &str, few_shot_examples: Option<&str>) -> String {
    let mut prompt = format!(
        "You are performing task-aware knowledge compression. Your goal is to compress the given \
         context while preserving all information relevant to the specified task.\n\n\
         TASK: {}\n\n",
        task_description
    );

    if let Some(examples) = few_shot_examples.filter(|e| !e.trim().is_empty()) {
        prompt.push_str(&format!("EXAMPLES:\n{}\n\n", examples));
    }

    prompt.push_str(
        "COMPRESSION INSTRUCTIONS:\n\
         1. Focus on key facts and relationships relevant to the task\n\
         2. Preserve important numerical data and metrics\n\
         3. Maintain critical entities and their attributes\n\
         4. Keep causal relationships and dependencies\n\
         5. Remove redundant or irrelevant information\n\
         6. Use concise language while maintaining accuracy\n\n\
         CONTEXT TO COMPRESS:\n",
    );
    prompt
}

/// Full prompt for one compression call.
pub fn compression_request(task_prompt: &str, text: &str, target_tokens: usize) -> String {
    format!(
        "{}\n{}\n\nPlease compress the above context to approximately {} tokens while preserving \
         all task-relevant information:",
        task_prompt, text, target_tokens
    )
}

/// Prompt asking the model to answer strictly from compressed knowledge.
pub fn answer_request(query: &str, compressed_knowledge: &str, task_type: &str) -> String {
    format!(
        "You are answering questions for the task '{}' using ONLY the compressed knowledge below. \
         If the answer is not contained in it, say that the compressed knowledge does not cover \
         the question. Do not use outside knowledge.\n\n\
         COMPRESSED KNOWLEDGE:\n{}\n\n\
         QUESTION: {}\n\n\
         ANSWER:",
        task_type, compressed_knowledge, query
    )
}

/// Default task description for a task type.
pub fn default_task_description(task_type: &str) -> String {
    format!(
        "Answer questions and perform analysis related to {}",
        task_type
    )
}
