//! Prompts sent to the vision model.
//!
//! The field names in [`ANALYSIS_PROMPT`] are the keys
//! [`crate::parse::parse_response`] looks up, so the two must change together.

/// Extraction instructions with the JSON shape the model is asked to fill.
pub const ANALYSIS_PROMPT: &str = concat!(
    "Extract and analyze the text from the provided invoice/receipt image and respond in JSON format. ",
    "Ensure accuracy and structure the response as follows:\n\n",
    "{\n",
    "  \"total_amount_due\": \"[Specify the total amount with decimal places and currency, e.g., 50.00 CHF]\",\n",
    "  \"currency_type\": \"[Insert the currency code, e.g., CHF, USD, EUR]\",\n",
    "  \"transaction_description\": \"[Insert a brief summary of the expense type, e.g., Lunch, Flight, Dinner, etc.]\",\n",
    "  \"invoice_receipt_creation_date\": \"[State the date as MM/DD/YYYY]\",\n",
    "  \"verification_of_document_type\": \"[State Yes or No]\",\n",
    "  \"confidence_in_accuracy\": \"[Insert your confidence level as a percentage, e.g., 95%]\"\n",
    "}\n\n",
);

/// Appended after [`ANALYSIS_PROMPT`].
pub const CONFIDENCE_PROMPT: &str =
    "Provide a confidence percentage (0-100%) regarding the accuracy of the summarized details.";

/// The full prompt sent with every image.
pub fn extraction_prompt() -> String {
    format!("{ANALYSIS_PROMPT}{CONFIDENCE_PROMPT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_parsed_field() {
        let prompt = extraction_prompt();
        for key in [
            "total_amount_due",
            "currency_type",
            "transaction_description",
            "invoice_receipt_creation_date",
            "verification_of_document_type",
            "confidence_in_accuracy",
        ] {
            assert!(prompt.contains(key), "prompt is missing {key}");
        }
    }

    #[test]
    fn confidence_suffix_comes_last() {
        let prompt = extraction_prompt();
        assert!(prompt.starts_with("Extract and analyze"));
        assert!(prompt.ends_with("accuracy of the summarized details."));
        assert!(prompt.contains("}\n\nProvide a confidence"));
    }
}
