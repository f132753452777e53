//! System prompts for VLM captioning.
//!
//! Centralising the prompt here keeps wording changes out of the retry and
//! error-handling code, and lets unit tests inspect the prompt without
//! spinning up a real VLM.

/// System prompt for captioning an extracted page or sub-image.
///
/// The caption is an *embedding source*, not prose for humans: it should be
/// dense with the terms a user would type when looking for this image.
pub const CAPTION_SYSTEM_PROMPT: &str = r#"You are an expert at describing document images for search and retrieval.

Given an image extracted from a PDF document, write a caption that a search engine can index.

Follow these rules precisely:

1. CONTENT
   - State what the image shows: a page of text, a table, a chart, a diagram, a photograph
   - Transcribe the title and any prominent headings verbatim
   - For tables and charts, name the quantities, axes, and notable values
   - For photographs and diagrams, describe the subjects and their arrangement

2. STYLE
   - 2 to 4 sentences of plain text
   - Use the document's own terminology so queries match
   - No markdown, no bullet points

3. WHAT TO OMIT
   - Page numbers, headers and footers repeated across pages
   - Decorative borders and watermarks
   - Commentary about image quality or your own confidence

Output ONLY the caption text."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_prompt_is_retrieval_oriented() {
        assert!(CAPTION_SYSTEM_PROMPT.contains("retrieval"));
        assert!(CAPTION_SYSTEM_PROMPT.contains("ONLY the caption"));
    }
}
