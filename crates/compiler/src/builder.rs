//! Prompt assembly — the per-turn pipeline.
//!
//! # Determinism
//!
//! Aside from the explicitly nondeterministic macros (`random`, `roll`),
//! assembly is deterministic: identical inputs produce identical prompts.
//! No step mutates compiler state, so one compiler instance serves any
//! number of conversations concurrently; serializing builds *within* a
//! conversation is the caller's job.

use tracing::debug;

use promptloom_config::EngineConfig;
use promptloom_core::error::{CompileError, Error, Result};
use promptloom_core::message::{Conversation, Message, Role};
use promptloom_core::persona::Persona;
use promptloom_lorebook::{MatchedEntry, ScanContext, find_matches_in};
use promptloom_macros::{MacroContext, MacroProcessor, extract_hidden_keys};
use promptloom_template::{EntryBlock, MessageBlock, RenderContext, TemplateRegistry};

use crate::static_context::CompiledStaticContext;

/// Inputs for a single [`PromptCompiler::build_prompt`] call.
///
/// Either `static_context` or `persona` must be set; everything else is
/// optional. With only a static context, dynamic lorebook matching is
/// skipped (the knowledge base lives on the persona) and render fields are
/// reconstructed from the snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildPromptOptions<'a> {
    /// Full persona, enabling dynamic lorebook matching
    pub persona: Option<&'a Persona>,

    /// Precomputed snapshot; recompiled from `persona` when absent
    pub static_context: Option<&'a CompiledStaticContext>,

    /// The stored conversation (history + the `pick` macro seed)
    pub conversation: Option<&'a Conversation>,

    /// The incoming user prompt for this turn
    pub user_prompt: &'a str,

    /// User display name; falls back to the static context's, then "User"
    pub user_name: Option<&'a str>,

    /// Greeting selection when the static context is compiled here
    pub greeting_index: Option<usize>,

    /// Template name; falls back to the configured default
    pub template: Option<&'a str>,

    /// Replaces the persona's system text when non-empty
    pub system_prompt_override: Option<&'a str>,
}

/// Owns the template registry, macro processor, and engine settings, and
/// exposes the two compilation phases.
pub struct PromptCompiler {
    config: EngineConfig,
    templates: TemplateRegistry,
    macros: MacroProcessor,
}

impl PromptCompiler {
    /// Compiler with default settings, built-in templates, and thread-local
    /// randomness.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_parts(config, TemplateRegistry::new(), MacroProcessor::new())
    }

    /// Full injection point — tests supply a seeded macro processor here.
    pub fn with_parts(
        config: EngineConfig,
        templates: TemplateRegistry,
        macros: MacroProcessor,
    ) -> Self {
        Self {
            config,
            templates,
            macros,
        }
    }

    /// Register a caller-supplied output format.
    pub fn register_template(&mut self, name: &str, source: &str) -> Result<()> {
        if source.len() > self.config.max_template_len {
            return Err(Error::Config {
                message: format!(
                    "template '{}' is {} bytes, over the {}-byte limit",
                    name,
                    source.len(),
                    self.config.max_template_len
                ),
            });
        }
        self.templates.register(name, source)?;
        Ok(())
    }

    /// Phase one: expand the persona's static text and match its constant
    /// knowledge entries. Invoke once per conversation and cache the result.
    pub fn compile_static_context(
        &self,
        persona: &Persona,
        user_name: &str,
        greeting_index: Option<usize>,
    ) -> CompiledStaticContext {
        let character_name = persona.display_name().to_string();
        let macro_ctx = MacroContext::new(character_name.clone(), user_name);

        // Constant entries are matched with an empty scan: key matching is
        // bypassed for them anyway, and window-gated constants stay out of
        // the snapshot at turn zero.
        let constant_entries = match &persona.knowledge_base {
            Some(base) => find_matches_in(
                base.constant_entries(),
                &ScanContext {
                    scan_text: "",
                    hidden_keys: &[],
                    messages: &[],
                    assistant_message_count: 0,
                    macro_context: &macro_ctx,
                },
                &self.macros,
            ),
            None => Vec::new(),
        };

        debug!(
            character = %character_name,
            constant_entries = constant_entries.len(),
            "Compiled static context"
        );

        CompiledStaticContext {
            character_name,
            user_name: user_name.to_string(),
            system_prompt: self.macros.process(&persona.system_prompt, &macro_ctx),
            description: self.macros.process(&persona.description, &macro_ctx),
            personality: self.macros.process(&persona.personality, &macro_ctx),
            scenario: self.macros.process(&persona.scenario, &macro_ctx),
            greeting: self.macros.process(persona.greeting(greeting_index), &macro_ctx),
            greeting_index,
            constant_entries,
        }
    }

    /// Phase two: assemble the full prompt for one turn.
    ///
    /// Fails only on argument validation and template errors; macro and
    /// per-entry lorebook problems are absorbed upstream. Nothing partial
    /// is ever returned.
    pub fn build_prompt(&self, options: &BuildPromptOptions<'_>) -> Result<String> {
        // Validate arguments before any work
        let compiled_fallback;
        let static_ctx = match (options.static_context, options.persona) {
            (Some(ctx), _) => ctx,
            (None, Some(persona)) => {
                let user_name = options.user_name.unwrap_or("User");
                compiled_fallback =
                    self.compile_static_context(persona, user_name, options.greeting_index);
                &compiled_fallback
            }
            (None, None) => {
                return Err(CompileError::InvalidArguments(
                    "either a compiled static context or a persona is required".into(),
                )
                .into());
            }
        };

        let user_name = options
            .user_name
            .unwrap_or(static_ctx.user_name.as_str())
            .to_string();
        let mut macro_ctx = MacroContext::new(static_ctx.character_name.clone(), user_name.clone());
        if let Some(conversation) = options.conversation {
            macro_ctx = macro_ctx.with_conversation_id(conversation.id.to_string());
        }

        // Expand macros in stored history so old messages still resolve
        // against the current character and user names.
        let history: &[Message] = options
            .conversation
            .map(|c| c.messages.as_slice())
            .unwrap_or_default();
        let mut messages: Vec<Message> = Vec::with_capacity(history.len() + 2);
        if history.is_empty() && !static_ctx.greeting.is_empty() {
            // A fresh conversation opens with the expanded greeting.
            messages.push(Message::assistant(static_ctx.greeting.clone()));
        }
        for message in history {
            let mut processed = message.clone();
            processed.content = self.macros.process(&message.content, &macro_ctx);
            messages.push(processed);
        }
        messages.push(Message::user(self.macros.process(options.user_prompt, &macro_ctx)));

        // Scan text: recent processed messages plus the raw prompt. Hidden
        // keys survive only in the raw portion (processing strips them),
        // and they widen the scan without appearing in visible output.
        let scan_start = messages.len().saturating_sub(self.config.scan_depth);
        let mut scan_text = messages[scan_start..]
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        scan_text.push('\n');
        scan_text.push_str(options.user_prompt);
        let hidden_keys = extract_hidden_keys(&scan_text);

        let assistant_count = messages.iter().filter(|m| m.role == Role::Assistant).count();

        // Dynamic lorebook pass over the persona's non-constant entries
        let dynamic_entries: Vec<MatchedEntry> = match options
            .persona
            .and_then(|p| p.knowledge_base.as_ref())
        {
            Some(base) => find_matches_in(
                base.dynamic_entries(),
                &ScanContext {
                    scan_text: &scan_text,
                    hidden_keys: &hidden_keys,
                    messages: &messages,
                    assistant_message_count: assistant_count,
                    macro_context: &macro_ctx,
                },
                &self.macros,
            ),
            None => Vec::new(),
        };

        // Constants first, then dynamic matches; each group keeps its
        // internal order.
        let entries: Vec<EntryBlock> = static_ctx
            .constant_entries
            .iter()
            .chain(dynamic_entries.iter())
            .map(|m| EntryBlock::new(m.decorators.role, m.content.clone()))
            .collect();

        let system_prompt = match options.system_prompt_override {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => static_ctx.system_prompt.clone(),
        };

        let render_ctx = RenderContext {
            character_name: static_ctx.character_name.clone(),
            user_name: user_name.clone(),
            system_prompt,
            description: static_ctx.description.clone(),
            personality: static_ctx.personality.clone(),
            scenario: static_ctx.scenario.clone(),
            entries,
            messages: messages
                .iter()
                .map(|m| MessageBlock::from_message(m, &static_ctx.character_name, &user_name))
                .collect(),
        };

        let template = options.template.unwrap_or(&self.config.default_template);
        debug!(
            template,
            messages = render_ctx.messages.len(),
            entries = render_ctx.entries.len(),
            dynamic = dynamic_entries.len(),
            "Building prompt"
        );

        Ok(self.templates.render(template, &render_ctx)?)
    }
}

impl Default for PromptCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloom_core::knowledge::{KnowledgeBase, KnowledgeEntry};

    fn aria() -> Persona {
        Persona {
            name: "Aria".into(),
            nickname: Some("Ari".into()),
            description: "{{char}} helps {{user}}".into(),
            first_message: "Hi {{user}}!".into(),
            ..Default::default()
        }
    }

    #[test]
    fn static_context_resolves_names_and_macros() {
        let compiler = PromptCompiler::new();
        let ctx = compiler.compile_static_context(&aria(), "Sam", None);
        assert_eq!(ctx.character_name, "Ari");
        assert_eq!(ctx.description, "Ari helps Sam");
        assert_eq!(ctx.greeting, "Hi Sam!");
    }

    #[test]
    fn greeting_index_selects_alternates_with_fallback() {
        let mut persona = aria();
        persona.alternate_greetings = vec!["Welcome, {{user}}.".into()];
        let compiler = PromptCompiler::new();

        let alt = compiler.compile_static_context(&persona, "Sam", Some(1));
        assert_eq!(alt.greeting, "Welcome, Sam.");

        let out_of_range = compiler.compile_static_context(&persona, "Sam", Some(5));
        assert_eq!(out_of_range.greeting, "Hi Sam!");
    }

    #[test]
    fn build_prompt_without_inputs_fails() {
        let compiler = PromptCompiler::new();
        let err = compiler
            .build_prompt(&BuildPromptOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Compile(CompileError::InvalidArguments(_))
        ));
    }

    #[test]
    fn unknown_template_propagates() {
        let compiler = PromptCompiler::new();
        let persona = aria();
        let err = compiler
            .build_prompt(&BuildPromptOptions {
                persona: Some(&persona),
                user_prompt: "hello",
                user_name: Some("Sam"),
                template: Some("nonexistent"),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn template_size_guard() {
        let mut compiler = PromptCompiler::with_config(EngineConfig {
            max_template_len: 16,
            ..Default::default()
        });
        let err = compiler
            .register_template("big", "{{character_name}} and a lot more text")
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn history_macros_resolve_against_current_names() {
        let compiler = PromptCompiler::new();
        let persona = aria();
        let mut conversation = Conversation::new();
        conversation.push(Message::assistant("{{char}} waves."));

        let prompt = compiler
            .build_prompt(&BuildPromptOptions {
                persona: Some(&persona),
                conversation: Some(&conversation),
                user_prompt: "hello",
                user_name: Some("Sam"),
                ..Default::default()
            })
            .unwrap();
        assert!(prompt.contains("Ari waves."));
        assert!(!prompt.contains("{{char}}"));
    }

    #[test]
    fn empty_history_opens_with_greeting() {
        let compiler = PromptCompiler::new();
        let persona = aria();
        let prompt = compiler
            .build_prompt(&BuildPromptOptions {
                persona: Some(&persona),
                user_prompt: "hello",
                user_name: Some("Sam"),
                ..Default::default()
            })
            .unwrap();
        assert!(prompt.contains("<|im_start|>assistant\nHi Sam!<|im_end|>"));
    }

    #[test]
    fn override_replaces_system_prompt() {
        let compiler = PromptCompiler::new();
        let mut persona = aria();
        persona.system_prompt = "Original rules.".into();

        let prompt = compiler
            .build_prompt(&BuildPromptOptions {
                persona: Some(&persona),
                user_prompt: "hello",
                user_name: Some("Sam"),
                system_prompt_override: Some("Override rules."),
                ..Default::default()
            })
            .unwrap();
        assert!(prompt.contains("Override rules."));
        assert!(!prompt.contains("Original rules."));
    }

    #[test]
    fn constant_entries_precede_dynamic_matches() {
        let mut persona = aria();
        persona.knowledge_base = Some(KnowledgeBase {
            entries: vec![
                KnowledgeEntry {
                    keys: vec!["dragon".into()],
                    content: "Dynamic dragon lore.".into(),
                    enabled: true,
                    ..Default::default()
                },
                KnowledgeEntry {
                    content: "Constant world facts.".into(),
                    enabled: true,
                    constant: true,
                    ..Default::default()
                },
            ],
        });
        let compiler = PromptCompiler::new();
        let prompt = compiler
            .build_prompt(&BuildPromptOptions {
                persona: Some(&persona),
                user_prompt: "tell me about the DRAGON",
                user_name: Some("Sam"),
                ..Default::default()
            })
            .unwrap();

        let constant = prompt.find("Constant world facts.").unwrap();
        let dynamic = prompt.find("Dynamic dragon lore.").unwrap();
        assert!(constant < dynamic);
    }

    #[test]
    fn hidden_keys_in_prompt_widen_the_scan_invisibly() {
        let mut persona = aria();
        persona.knowledge_base = Some(KnowledgeBase {
            entries: vec![KnowledgeEntry {
                keys: vec!["gryphon".into()],
                content: "Gryphons nest high.".into(),
                enabled: true,
                ..Default::default()
            }],
        });
        let compiler = PromptCompiler::new();
        let prompt = compiler
            .build_prompt(&BuildPromptOptions {
                persona: Some(&persona),
                user_prompt: "What lives on the peaks?{{hidden_key:gryphon}}",
                user_name: Some("Sam"),
                ..Default::default()
            })
            .unwrap();

        assert!(prompt.contains("Gryphons nest high."));
        // The marker itself never reaches visible output
        assert!(!prompt.contains("hidden_key"));
    }

    #[test]
    fn static_only_build_skips_dynamic_matching() {
        let mut persona = aria();
        persona.knowledge_base = Some(KnowledgeBase {
            entries: vec![KnowledgeEntry {
                keys: vec!["dragon".into()],
                content: "Dynamic dragon lore.".into(),
                enabled: true,
                ..Default::default()
            }],
        });
        let compiler = PromptCompiler::new();
        let static_ctx = compiler.compile_static_context(&persona, "Sam", None);

        let prompt = compiler
            .build_prompt(&BuildPromptOptions {
                static_context: Some(&static_ctx),
                user_prompt: "tell me about the dragon",
                ..Default::default()
            })
            .unwrap();

        // No persona handed in: the knowledge base is unavailable
        assert!(!prompt.contains("Dynamic dragon lore."));
        // Static fields still render
        assert!(prompt.contains("Ari helps Sam"));
    }
}
