/// Instruction sent along with a failing workflow.
pub fn correction_prompt(workflow_content: &str) -> String {
    format!(
        "Here is a GitHub Actions workflow file that is failing:\n\n\
         {workflow_content}\n\n\
         Please provide a corrected version of this file, ONLY provide the code no additional comments."
    )
}
