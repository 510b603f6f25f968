//! Prompt templates for planning, query generation, drafting, and grading.

/// User message sent alongside the query-writer instructions.
pub const QUERY_WRITER_REQUEST: &str = "Generate search queries on the provided topic.";

/// User message sent alongside the planner query-writer instructions.
pub const PLANNER_QUERY_REQUEST: &str =
    "Generate search queries that will help with planning the sections of the report.";

/// User message sent alongside the planner instructions.
pub const PLANNER_REQUEST: &str = "Generate the sections of the report. Your response must include a 'sections' field \
     containing a list of sections. Each section must have: name, description, research, and content fields.";

/// User message sent alongside the grader instructions.
pub const GRADER_REQUEST: &str = "Grade the report and consider follow-up questions for missing information. \
     If the grade is 'pass', return an empty list of follow-up queries. \
     If the grade is 'fail', provide specific search queries to gather missing information.";

/// User message sent alongside the final-section writer instructions.
pub const FINAL_SECTION_REQUEST: &str = "Generate a report section based on the provided sources.";

/// System prompt for the section writer.
pub const SECTION_WRITER_INSTRUCTIONS: &str = "Write one section of a research report.

<Task>
1. Review the report topic, section name, and section topic carefully.
2. If present, review any existing section content.
3. Then, look at the provided Source material.
4. Decide the sources that you will use to write a report section.
5. Write the report section and list your sources.
</Task>

<Writing Guidelines>
- If existing section content is not populated, write from scratch
- If existing section content is populated, synthesize it with the source material
- Strict 150-200 word limit
- Use simple, clear language
- Use short paragraphs (2-3 sentences max)
- Use ## for section title (Markdown format)
</Writing Guidelines>

<Citation Rules>
- Assign each unique URL a single citation number in your text
- End with ### Sources that lists each source with corresponding numbers
- IMPORTANT: Number sources sequentially without gaps (1,2,3,4...) in the final list regardless of which sources you choose
- Example format:
  [1] Source Title: URL
  [2] Source Title: URL
</Citation Rules>

<Final Check>
1. Verify that EVERY claim is grounded in the provided Source material
2. Confirm each URL appears ONLY ONCE in the Source list
3. Verify that sources are numbered sequentially (1,2,3...) without any gaps
</Final Check>";

/// Instructions for generating the research queries of one section.
pub fn query_writer_instructions(
    topic: &str,
    section_topic: &str,
    number_of_queries: usize,
) -> String {
    format!(
        "You are an expert technical writer crafting targeted web search queries that will gather \
comprehensive information for writing a report section.

<Report Topic>
{topic}
</Report Topic>

<Section Topic>
{section_topic}
</Section Topic>

<Task>
Your goal is to generate {number_of_queries} search queries that will gather comprehensive information about the above section topic.
The queries should:
1. Be related to the topic
2. Examine different aspects of the topic

Make the queries specific enough to find high-quality, relevant sources.
</Task>"
    )
}

/// Instructions for generating the planning queries of a report.
pub fn planner_query_writer_instructions(
    topic: &str,
    report_organization: &str,
    number_of_queries: usize,
) -> String {
    format!(
        "You are performing research for a report.

<Report topic>
{topic}
</Report topic>

<Report organization>
{report_organization}
</Report organization>

<Task>
Your goal is to generate {number_of_queries} web search queries that will help gather information for planning the report sections.

The queries should:
1. Be related to the topic of the report
2. Help satisfy the requirements specified in the report organization

Make the queries specific enough to find high-quality, relevant sources while covering the breadth needed for the report structure.
</Task>"
    )
}

/// Instructions for drafting the section plan of a report.
pub fn planner_instructions(
    topic: &str,
    report_organization: &str,
    context: &str,
    feedback: Option<&str>,
) -> String {
    let feedback = feedback.unwrap_or("None");
    format!(
        "I want a plan for a report that is concise and focused.

<Report topic>
The topic of the report is:
{topic}
</Report topic>

<Report organization>
The report should follow this organization:
{report_organization}
</Report organization>

<Context>
Here is context to use to plan the sections of the report:
{context}
</Context>

<Task>
Generate a list of sections for the report. Your plan should be tight and focused with NO overlapping sections or unnecessary filler.

Each section should have the fields:
- name - Name for this section of the report.
- description - Brief overview of the main topics covered in this section.
- research - Whether to perform web research for this section of the report.
- content - The content of the section, which you will leave blank for now.

Integration guidelines:
- Include examples and implementation details within main topic sections, not as separate sections
- Ensure each section has a distinct purpose with no content overlap
- Combine related concepts rather than separating them
- Every section name must be unique

Before submitting, review your structure to ensure it has no redundant sections and follows a logical flow.
</Task>

<Feedback>
Here is feedback on the report structure from review (if any):
{feedback}
</Feedback>"
    )
}

/// User prompt for the section writer.
pub fn section_writer_inputs(
    topic: &str,
    section_name: &str,
    section_topic: &str,
    section_content: &str,
    context: &str,
) -> String {
    format!(
        "<Report topic>
{topic}
</Report topic>

<Section name>
{section_name}
</Section name>

<Section topic>
{section_topic}
</Section topic>

<Existing section content (if populated)>
{section_content}
</Existing section content>

<Source material>
{context}
</Source material>"
    )
}

/// Instructions for grading a drafted section.
pub fn section_grader_instructions(
    topic: &str,
    section_topic: &str,
    section: &str,
    number_of_follow_up_queries: usize,
) -> String {
    format!(
        "Review a report section relative to the specified topic:

<Report topic>
{topic}
</Report topic>

<Section topic>
{section_topic}
</Section topic>

<Section content>
{section}
</Section content>

<Task>
Evaluate whether the section content adequately addresses the section topic.

If the section content does not adequately address the section topic, generate {number_of_follow_up_queries} follow-up search queries to gather missing information.
</Task>"
    )
}

/// Instructions for drafting a section that needs no research.
pub fn final_section_writer_instructions(
    topic: &str,
    section_name: &str,
    section_topic: &str,
    context: &str,
) -> String {
    format!(
        "You are an expert technical writer crafting a section that synthesizes information from the rest of the report.

<Report topic>
{topic}
</Report topic>

<Section name>
{section_name}
</Section name>

<Section topic>
{section_topic}
</Section topic>

<Available report content>
{context}
</Available report content>

<Task>
1. Section-Specific Approach:

For Introduction:
- Use # for report title (Markdown format)
- 50-100 word limit
- Write in simple and clear language
- Focus on the core motivation for the report in 1-2 paragraphs
- Use a clear narrative arc to introduce the report
- Include NO structural elements (no lists or tables)
- No sources section needed

For Conclusion/Summary:
- Use ## for section title (Markdown format)
- 100-150 word limit
- For comparative reports, include a focused comparison table using Markdown table syntax
- For non-comparative reports, use at most one structural element (a table or a list) to distill the points made in the report
- End with specific next steps or implications
- No sources section needed

2. Writing Approach:
- Use concrete details over general statements
- Make every word count
- Focus on your single most important point
</Task>

<Quality Checks>
- For introduction: 50-100 word limit, # for report title, no structural elements, no sources section
- For conclusion: 100-150 word limit, ## for section title, only ONE structural element at most, no sources section
- Markdown format
- Do not include word count or any preamble in your response
</Quality Checks>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_writer_interpolates_fields() {
        let prompt = query_writer_instructions("Quantum Computing", "Error correction codes", 3);
        assert!(prompt.contains("Quantum Computing"));
        assert!(prompt.contains("Error correction codes"));
        assert!(prompt.contains("generate 3 search queries"));
    }

    #[test]
    fn test_planner_instructions_without_feedback() {
        let prompt = planner_instructions("Rust", "intro, body, conclusion", "ctx", None);
        assert!(prompt.contains("intro, body, conclusion"));
        assert!(prompt.contains("(if any):\nNone"));
    }

    #[test]
    fn test_planner_instructions_carry_feedback() {
        let prompt = planner_instructions(
            "Quantum Computing",
            "structure",
            "ctx",
            Some("add more about error correction"),
        );
        assert!(prompt.contains("add more about error correction"));
    }

    #[test]
    fn test_section_writer_inputs_include_existing_content() {
        let inputs = section_writer_inputs("t", "Hardware", "qubits", "## Hardware\nold", "sources");
        assert!(inputs.contains("## Hardware\nold"));
        assert!(inputs.contains("<Source material>\nsources"));
    }

    #[test]
    fn test_section_writer_citation_rules() {
        assert!(SECTION_WRITER_INSTRUCTIONS.contains("single citation number"));
        assert!(SECTION_WRITER_INSTRUCTIONS.contains("sequentially without gaps"));
    }
}
