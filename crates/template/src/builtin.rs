//! Built-in output formats.
//!
//! Each template emits, in order: the system prompt, the persona sections
//! (only when non-empty), every matched knowledge entry in its role-tagged
//! block, the message history chronologically, and an open turn for the
//! assistant's next reply.

/// ChatML-style markup (`<|im_start|>role ... <|im_end|>`). The default.
pub const CHATML: &str = "\
{{#if system_prompt~}}
<|im_start|>system
{{system_prompt}}<|im_end|>
{{/if~}}
{{#if description~}}
<|im_start|>system
{{description}}<|im_end|>
{{/if~}}
{{#if personality~}}
<|im_start|>system
{{character_name}}'s personality: {{personality}}<|im_end|>
{{/if~}}
{{#if scenario~}}
<|im_start|>system
Scenario: {{scenario}}<|im_end|>
{{/if~}}
{{#each entries~}}
<|im_start|>{{role}}
{{content}}<|im_end|>
{{/each~}}
{{#each messages~}}
<|im_start|>{{role}}
{{content}}<|im_end|>
{{/each~}}
<|im_start|>assistant
";

/// Instruction-tuned style: persona text up front, turns as
/// `### Instruction:` / `### Response:` blocks.
pub const INSTRUCT: &str = "\
{{#if system_prompt~}}
{{system_prompt}}

{{/if~}}
{{#if description~}}
{{description}}

{{/if~}}
{{#if personality~}}
{{character_name}}'s personality: {{personality}}

{{/if~}}
{{#if scenario~}}
Scenario: {{scenario}}

{{/if~}}
{{#each entries~}}
{{content}}

{{/each~}}
{{#each messages~}}
{{#if is_user~}}
### Instruction:
{{/if~}}
{{#unless is_user~}}
### Response:
{{/unless~}}
{{content}}

{{/each~}}
### Response:
";

/// Turn-delimited plain text: `Name: line` per message, with the character
/// name left open at the end.
pub const TURNS: &str = "\
{{#if system_prompt~}}
{{system_prompt}}

{{/if~}}
{{#if description~}}
{{description}}

{{/if~}}
{{#if personality~}}
{{character_name}}'s personality: {{personality}}

{{/if~}}
{{#if scenario~}}
Scenario: {{scenario}}

{{/if~}}
{{#each entries~}}
{{content}}

{{/each~}}
{{#each messages~}}
{{speaker}}: {{content}}
{{/each~}}
{{character_name}}:";
