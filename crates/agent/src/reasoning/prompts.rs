//! Prompt text for the model-backed reasoner

pub const EXTRACTION_SYSTEM: &str = "You extract structured facts about a research topic from \
the evidence you are given. Only use the evidence. Every value must cite the [source_id] tags \
of the evidence that states it. Leave a field out when the evidence does not state it. \
When sources disagree, propose each value with its own sources. \
Answer by calling record_extraction.";

pub const CRITIQUE_SYSTEM: &str = "You review a structured record about a research topic \
against the evidence it was built from. Report values the evidence contradicts or does not \
support as blocking issues, and minor doubts as warnings. Suggest short web search queries \
that would find missing or doubtful values. Answer by calling record_critique.";

pub const EXTRACTION_TOOL: &str = "record_extraction";
pub const CRITIQUE_TOOL: &str = "record_critique";

pub const EXTRACTION_TOOL_DESCRIPTION: &str = "Record the field values found in the evidence.";
pub const CRITIQUE_TOOL_DESCRIPTION: &str =
    "Record problems with the record and follow-up searches.";
