use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use validator::Validate;

use crate::error::PesquisaError;

/// Text-backed enumeration stored as snake_case in the database and on the wire.
macro_rules! texto_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[serde(rename_all = "snake_case")]
        #[sqlx(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn values() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = PesquisaError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(PesquisaError::invalid_enum(stringify!($name), s, &Self::values())),
                }
            }
        }
    };
}

texto_enum!(
    /// Access level; the declaration order is the privilege order.
    PapelUsuario {
        Visualizador => "visualizador",
        Pesquisador => "pesquisador",
        Admin => "admin",
    }
);

impl PapelUsuario {
    pub fn nivel(&self) -> u8 {
        match self {
            PapelUsuario::Visualizador => 0,
            PapelUsuario::Pesquisador => 1,
            PapelUsuario::Admin => 2,
        }
    }

    pub fn satisfaz(&self, minimo: PapelUsuario) -> bool {
        self.nivel() >= minimo.nivel()
    }
}

texto_enum!(StatusPesquisa {
    Rascunho => "rascunho",
    Ativa => "ativa",
    Pausada => "pausada",
    Encerrada => "encerrada",
});

texto_enum!(TipoPergunta {
    Aberta => "aberta",
    UnicaEscolha => "unica_escolha",
    MultiplaEscolha => "multipla_escolha",
    Escala => "escala",
    SimNao => "sim_nao",
});

texto_enum!(Genero {
    Masculino => "masculino",
    Feminino => "feminino",
    Outro => "outro",
});

texto_enum!(OrientacaoPolitica {
    Esquerda => "esquerda",
    CentroEsquerda => "centro_esquerda",
    Centro => "centro",
    CentroDireita => "centro_direita",
    Direita => "direita",
});

texto_enum!(DirecaoMensagem {
    Entrada => "entrada",
    Saida => "saida",
});

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Usuario {
    pub id: i64,
    pub email: String,
    pub nome: String,
    #[serde(skip_serializing)]
    pub senha_hash: String,
    pub papel: PapelUsuario,
    pub ativo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AtualizacaoUsuario {
    #[validate(length(min = 1, max = 200))]
    pub nome: Option<String>,
    pub papel: Option<PapelUsuario>,
    pub ativo: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Eleitor {
    pub id: i64,
    pub nome: String,
    pub idade: i64,
    pub genero: Genero,
    pub cor_raca: Option<String>,
    pub regiao_administrativa: Option<String>,
    pub escolaridade: Option<String>,
    pub faixa_renda: Option<String>,
    pub ocupacao: Option<String>,
    pub religiao: Option<String>,
    pub orientacao_politica: OrientacaoPolitica,
    pub interesse_politico: Option<String>,
    pub estado_civil: Option<String>,
    pub atributos: Json<serde_json::Map<String, serde_json::Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NovoEleitor {
    #[validate(length(min = 1, max = 200))]
    pub nome: String,
    #[validate(range(min = 16, max = 120))]
    pub idade: i64,
    pub genero: Genero,
    #[serde(default)]
    pub cor_raca: Option<String>,
    #[serde(default)]
    pub regiao_administrativa: Option<String>,
    #[serde(default)]
    pub escolaridade: Option<String>,
    #[serde(default)]
    pub faixa_renda: Option<String>,
    #[serde(default)]
    pub ocupacao: Option<String>,
    #[serde(default)]
    pub religiao: Option<String>,
    pub orientacao_politica: OrientacaoPolitica,
    #[serde(default)]
    pub interesse_politico: Option<String>,
    #[serde(default)]
    pub estado_civil: Option<String>,
    #[serde(default)]
    pub atributos: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltroEleitores {
    pub genero: Option<Genero>,
    pub regiao_administrativa: Option<String>,
    pub orientacao_politica: Option<OrientacaoPolitica>,
    pub idade_min: Option<i64>,
    pub idade_max: Option<i64>,
    /// Case-insensitive substring match on the name.
    pub busca: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paginacao {
    pub pagina: i64,
    pub por_pagina: i64,
}

impl Paginacao {
    pub const POR_PAGINA_PADRAO: i64 = 50;
    pub const POR_PAGINA_MAX: i64 = 200;

    pub fn new(pagina: Option<i64>, por_pagina: Option<i64>) -> Result<Self, PesquisaError> {
        let pagina = pagina.unwrap_or(1);
        let por_pagina = por_pagina.unwrap_or(Self::POR_PAGINA_PADRAO);
        if pagina < 1 {
            return Err(PesquisaError::ValidationError(
                "pagina deve ser >= 1".to_string(),
            ));
        }
        if !(1..=Self::POR_PAGINA_MAX).contains(&por_pagina) {
            return Err(PesquisaError::ValidationError(format!(
                "por_pagina deve estar entre 1 e {}",
                Self::POR_PAGINA_MAX
            )));
        }
        if (pagina - 1).checked_mul(por_pagina).is_none() {
            return Err(PesquisaError::ValidationError(format!(
                "pagina {} fora do intervalo",
                pagina
            )));
        }
        Ok(Self { pagina, por_pagina })
    }

    pub fn offset(&self) -> i64 {
        (self.pagina - 1) * self.por_pagina
    }
}

impl Default for Paginacao {
    fn default() -> Self {
        Self {
            pagina: 1,
            por_pagina: Self::POR_PAGINA_PADRAO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContagemCategoria {
    pub categoria: String,
    pub total: i64,
    pub percentual: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Candidato {
    pub id: i64,
    pub nome: String,
    pub partido: String,
    pub numero: i64,
    pub cargo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NovoCandidato {
    #[validate(length(min = 1, max = 200))]
    pub nome: String,
    #[validate(length(min = 1, max = 30))]
    pub partido: String,
    #[validate(range(min = 1, max = 99999))]
    pub numero: i64,
    #[validate(length(min = 1, max = 60))]
    pub cargo: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Pesquisa {
    pub id: i64,
    pub titulo: String,
    pub descricao: Option<String>,
    pub status: StatusPesquisa,
    pub criado_por: Option<i64>,
    pub iniciada_em: Option<DateTime<Utc>>,
    pub encerrada_em: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NovaPesquisa {
    #[validate(length(min = 1, max = 300))]
    pub titulo: String,
    #[serde(default)]
    pub descricao: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AtualizacaoPesquisa {
    #[validate(length(min = 1, max = 300))]
    pub titulo: Option<String>,
    pub descricao: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PerguntaPesquisa {
    pub id: i64,
    pub pesquisa_id: i64,
    pub ordem: i64,
    pub texto: String,
    pub tipo: TipoPergunta,
    pub opcoes: Json<Vec<String>>,
    pub obrigatoria: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NovaPergunta {
    #[validate(length(min = 1, max = 1000))]
    pub texto: String,
    pub tipo: TipoPergunta,
    #[serde(default)]
    pub opcoes: Vec<String>,
    #[serde(default = "default_obrigatoria")]
    pub obrigatoria: bool,
    /// Position within the poll; appended at the end when absent.
    #[serde(default)]
    pub ordem: Option<i64>,
}

fn default_obrigatoria() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Resposta {
    pub id: i64,
    pub pesquisa_id: i64,
    pub pergunta_id: i64,
    pub eleitor_id: i64,
    pub valor: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespostaItem {
    pub pergunta_id: i64,
    pub valor: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NovaEntrevista {
    pub eleitor_id: i64,
    pub respostas: Vec<RespostaItem>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContatoWhatsApp {
    pub id: i64,
    pub telefone: String,
    pub nome: Option<String>,
    pub eleitor_id: Option<i64>,
    pub opt_in: bool,
    pub ultima_mensagem_em: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MensagemWhatsApp {
    pub id: i64,
    pub contato_id: i64,
    pub direcao: DirecaoMensagem,
    pub wa_message_id: Option<String>,
    pub conteudo: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventoAuditoria {
    pub id: i64,
    pub tipo: String,
    pub usuario_id: Option<i64>,
    pub detalhes: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_text() {
        assert_eq!("centro_esquerda".parse::<OrientacaoPolitica>().unwrap(), OrientacaoPolitica::CentroEsquerda);
        assert_eq!(TipoPergunta::MultiplaEscolha.as_str(), "multipla_escolha");
        assert_eq!(" Ativa ".parse::<StatusPesquisa>().unwrap(), StatusPesquisa::Ativa);
        assert!("talvez".parse::<Genero>().is_err());
    }

    #[test]
    fn test_papel_hierarchy() {
        assert!(PapelUsuario::Admin.satisfaz(PapelUsuario::Pesquisador));
        assert!(PapelUsuario::Pesquisador.satisfaz(PapelUsuario::Pesquisador));
        assert!(!PapelUsuario::Visualizador.satisfaz(PapelUsuario::Pesquisador));
    }

    #[test]
    fn test_paginacao_bounds() {
        let p = Paginacao::new(Some(3), Some(20)).unwrap();
        assert_eq!(p.offset(), 40);
        assert!(Paginacao::new(Some(0), None).is_err());
        assert!(Paginacao::new(None, Some(500)).is_err());
        assert_eq!(Paginacao::new(None, None).unwrap(), Paginacao::default());
    }

    #[test]
    fn test_paginacao_rejects_overflowing_offset() {
        assert!(matches!(
            Paginacao::new(Some(i64::MAX), Some(50)),
            Err(PesquisaError::ValidationError(_))
        ));
        let ultima = i64::MAX / 200 + 1;
        let p = Paginacao::new(Some(ultima), Some(200)).unwrap();
        assert!(p.offset() >= 0);
    }

    #[test]
    fn test_serde_matches_text() {
        let json = serde_json::to_string(&TipoPergunta::SimNao).unwrap();
        assert_eq!(json, "\"sim_nao\"");
    }
}
