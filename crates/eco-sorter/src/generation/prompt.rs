//! Grounded prompt template for sorting questions

use crate::providers::vector_store::VectorSearchResult;
use crate::region::Region;

/// Prompt builder for region-restricted sorting questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved passages with a blank line, in retrieval order
    pub fn build_context(results: &[VectorSearchResult]) -> String {
        results
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Sentence the model must answer with when the guide has nothing
    pub fn refusal(region: Region) -> String {
        format!(
            "Je n'ai pas l'information précise dans mon guide pour cet objet. \
             Par précaution, vérifiez sur {}.",
            region.fallback_authority()
        )
    }

    /// Build the full prompt with strict grounding
    pub fn build_prompt(question: &str, context: &str, region: Region) -> String {
        format!(
            r#"
Tu es Eco-Sorter, un assistant expert en gestion des déchets pour la région de {region}.
Ta mission est d'aider les citoyens à trier correctement pour soutenir l'objectif de développement durable.

CONSIGNES STRICTES :
1. Utilise UNIQUEMENT le contexte fourni ci-dessous pour répondre.
2. Si la réponse se trouve dans le contexte, sois précis : dis exactement dans quel sac (Jaune, Bleu, Blanc, Orange, Vert) ou quel lieu (Proxy Chimik, Recypark, Bulles à verre) l'objet doit aller.
3. Si le contexte mentionne que c'est "INTERDIT" dans un sac, cherche dans le reste du contexte où c'est "AUTORISÉ".
4. Si tu ne trouves PAS la réponse dans le contexte, dis poliment : "{refusal}" (N'invente rien).

CONTEXTE ISSU DU GUIDE DE TRI :
{context}

QUESTION DE L'UTILISATEUR :
{question}

RÉPONSE :
"#,
            region = region.label(),
            refusal = Self::refusal(region),
            context = context,
            question = question.trim(),
        )
    }
}
