//! 界面文本（pt-br / en / es）。
//!
//! 文本表在启动时按语言选定一次，之后只读；核心流程不读取这里的任何内容。
//! 模板中的 `{}` 依次由 [`fill`] 替换。

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    PtBr,
    En,
    Es,
}

pub const LANGUAGES: [Language; 3] = [Language::PtBr, Language::En, Language::Es];

impl Language {
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        LANGUAGES
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(code))
    }

    /// 同时用作章节的 `translatedLanguage` 参数。
    pub fn code(self) -> &'static str {
        match self {
            Language::PtBr => "pt-br",
            Language::En => "en",
            Language::Es => "es",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::PtBr => "Português Brasileiro",
            Language::En => "English",
            Language::Es => "Español",
        }
    }

    pub fn strings(self) -> &'static Strings {
        match self {
            Language::PtBr => &PT_BR,
            Language::En => &EN,
            Language::Es => &ES,
        }
    }
}

#[derive(Debug)]
pub struct Strings {
    pub language_prompt: &'static str,
    pub invalid_language: &'static str,
    pub selected_language: &'static str,
    pub title_prompt: &'static str,
    pub title_empty: &'static str,
    pub work_not_found: &'static str,
    pub work_found: &'static str,
    pub no_confident_match: &'static str,
    pub suggestion: &'static str,
    pub fetching_chapters: &'static str,
    pub chapters_failed: &'static str,
    pub no_chapters: &'static str,
    pub available_chapters: &'static str,
    pub chapter_item: &'static str,
    pub more_chapters: &'static str,
    pub selection_prompt: &'static str,
    pub selection_empty: &'static str,
    pub invalid_ranges: &'static str,
    pub empty_ranges: &'static str,
    pub chapters_not_found: &'static str,
    pub invalid_inputs: &'static str,
    pub nothing_selected: &'static str,
    pub work_dir_failed: &'static str,
    pub download_notice: &'static str,
    pub chapter_started: &'static str,
    pub chapter_success: &'static str,
    pub chapter_no_assets: &'static str,
    pub chapter_failed: &'static str,
    pub bar_chapters: &'static str,
    pub bar_images: &'static str,
    pub summary_title: &'static str,
    pub summary_success: &'static str,
    pub summary_no_assets: &'static str,
    pub summary_failed: &'static str,
    pub summary_footer: &'static str,
    pub continue_prompt: &'static str,
    pub search_again_option: &'static str,
    pub exit_option: &'static str,
    pub invalid_option: &'static str,
    pub exiting: &'static str,
    pub finished: &'static str,
}

/// 依次用 `args` 替换模板中的 `{}`；多余的占位符原样保留。
pub fn fill(template: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    let mut args = args.iter();
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

static PT_BR: Strings = Strings {
    language_prompt: "🌍 Selecione o idioma para download",
    invalid_language: "Código de idioma inválido: {}. Usando seleção interativa.",
    selected_language: "Idioma selecionado: {}",
    title_prompt: "Digite o nome do mangá: ",
    title_empty: "⚠️ O título do mangá não pode estar vazio.",
    work_not_found: "Nenhum mangá encontrado com o nome: {}",
    work_found: "📚 Mangá encontrado: {} ({}%)",
    no_confident_match: "Nenhuma correspondência exata encontrada para '{}'. Resultados similares:",
    suggestion: "🔹 {} (Similaridade: {}%)",
    fetching_chapters: "🔍 Buscando capítulos ({})...",
    chapters_failed: "Erro ao buscar capítulos: {}",
    no_chapters: "⚠️ Nenhum capítulo disponível no idioma selecionado ({}).",
    available_chapters: "\n📖 Capítulos disponíveis ({}):",
    chapter_item: "• Capítulo {}",
    more_chapters: "    ... (mais {} capítulos) ...",
    selection_prompt: "Digite os capítulos (ex: 1 5 10.5), 'all'/'todos', ou intervalo (ex: 20-25): ",
    selection_empty: "⚠️ A seleção de capítulos não pode estar vazia.",
    invalid_ranges: "⚠️ Intervalo(s) inválido(s): {}. Use XX-YY com números >= 0 e início <= fim.",
    empty_ranges: "⚠️ Nenhum capítulo encontrado no(s) intervalo(s): {}.",
    chapters_not_found: "⚠️ Capítulo(s) não encontrado(s) na lista: {}.",
    invalid_inputs: "⚠️ Entrada(s) de capítulo inválida(s): {}. Digite números >= 0, 'all'/'todos' ou intervalos.",
    nothing_selected: "⚠️ Nenhum capítulo válido selecionado para download.",
    work_dir_failed: "Erro ao criar o diretório do mangá: {}",
    download_notice: "\n⚠️ Aviso: {} downloads simultâneos, intervalo de {}s entre capítulos.",
    chapter_started: "\n📥 [{}/{}] Baixando imagens para o Capítulo {}...",
    chapter_success: "✅ Capítulo {}: {} imagens em {}",
    chapter_no_assets: "⚠️ Nenhuma imagem baixada para o Capítulo {}.",
    chapter_failed: "⚠️ Falha ao processar o Capítulo {}: {}",
    bar_chapters: "Capítulos",
    bar_images: "Imagens",
    summary_title: "\n--- Resumo do Download ---",
    summary_success: " Sucesso: {} capítulos",
    summary_no_assets: " Sem imagens: {} capítulos",
    summary_failed: " Falha: {} capítulos",
    summary_footer: "---------------------------\n",
    continue_prompt: "O que você gostaria de fazer agora?",
    search_again_option: "Buscar outro mangá",
    exit_option: "Sair",
    invalid_option: "Opção inválida.",
    exiting: "Saindo...",
    finished: "Programa finalizado.",
};

static EN: Strings = Strings {
    language_prompt: "🌍 Select the download language",
    invalid_language: "Invalid language code: {}. Using interactive selection.",
    selected_language: "Selected language: {}",
    title_prompt: "Enter the manga name: ",
    title_empty: "⚠️ Manga title cannot be empty.",
    work_not_found: "No manga found with the name: {}",
    work_found: "📚 Manga found: {} ({}%)",
    no_confident_match: "No exact match found for '{}'. Similar results:",
    suggestion: "🔹 {} (Similarity: {}%)",
    fetching_chapters: "🔍 Fetching chapters ({})...",
    chapters_failed: "Error fetching chapters: {}",
    no_chapters: "⚠️ No chapters available in the selected language ({}).",
    available_chapters: "\n📖 Available chapters ({}):",
    chapter_item: "• Chapter {}",
    more_chapters: "    ... ({} more chapters) ...",
    selection_prompt: "Enter chapters (e.g., 1 5 10.5), 'all'/'todos', or range (e.g., 20-25): ",
    selection_empty: "⚠️ Chapter selection cannot be empty.",
    invalid_ranges: "⚠️ Invalid range(s): {}. Use XX-YY with numbers >= 0 and start <= end.",
    empty_ranges: "⚠️ No chapters found in range(s): {}.",
    chapters_not_found: "⚠️ Chapter(s) not found in list: {}.",
    invalid_inputs: "⚠️ Invalid chapter input(s): {}. Enter numbers >= 0, 'all'/'todos', or ranges.",
    nothing_selected: "⚠️ No valid chapters selected for download.",
    work_dir_failed: "Error creating manga directory: {}",
    download_notice: "\n⚠️ Notice: {} parallel downloads, {}s delay between chapters.",
    chapter_started: "\n📥 [{}/{}] Downloading images for Chapter {}...",
    chapter_success: "✅ Chapter {}: {} images in {}",
    chapter_no_assets: "⚠️ No images downloaded for Chapter {}.",
    chapter_failed: "⚠️ Failed to process Chapter {}: {}",
    bar_chapters: "Chapters",
    bar_images: "Images",
    summary_title: "\n--- Download Summary ---",
    summary_success: " Success: {} chapters",
    summary_no_assets: " No images: {} chapters",
    summary_failed: " Failed: {} chapters",
    summary_footer: "------------------------\n",
    continue_prompt: "What would you like to do next?",
    search_again_option: "Search another manga",
    exit_option: "Exit",
    invalid_option: "Invalid option.",
    exiting: "Exiting...",
    finished: "Program finished.",
};

static ES: Strings = Strings {
    language_prompt: "🌍 Seleccione el idioma para descargar",
    invalid_language: "Código de idioma no válido: {}. Usando selección interactiva.",
    selected_language: "Idioma seleccionado: {}",
    title_prompt: "Escriba el nombre del manga: ",
    title_empty: "⚠️ El título del manga no puede estar vacío.",
    work_not_found: "No se encontró ningún manga con el nombre: {}",
    work_found: "📚 Manga encontrado: {} ({}%)",
    no_confident_match: "No se encontró una coincidencia exacta para '{}'. Resultados similares:",
    suggestion: "🔹 {} (Similitud: {}%)",
    fetching_chapters: "🔍 Buscando capítulos ({})...",
    chapters_failed: "Error al buscar capítulos: {}",
    no_chapters: "⚠️ No hay capítulos disponibles en el idioma seleccionado ({}).",
    available_chapters: "\n📖 Capítulos disponibles ({}):",
    chapter_item: "• Capítulo {}",
    more_chapters: "    ... ({} capítulos más) ...",
    selection_prompt: "Escriba los capítulos (ej: 1 5 10.5), 'all'/'todos', o intervalo (ej: 20-25): ",
    selection_empty: "⚠️ La selección de capítulos no puede estar vacía.",
    invalid_ranges: "⚠️ Intervalo(s) no válido(s): {}. Use XX-YY con números >= 0 e inicio <= fin.",
    empty_ranges: "⚠️ No se encontraron capítulos en el/los intervalo(s): {}.",
    chapters_not_found: "⚠️ Capítulo(s) no encontrado(s) en la lista: {}.",
    invalid_inputs: "⚠️ Entrada(s) de capítulo no válida(s): {}. Escriba números >= 0, 'all'/'todos' o intervalos.",
    nothing_selected: "⚠️ No se seleccionó ningún capítulo válido para descargar.",
    work_dir_failed: "Error al crear el directorio del manga: {}",
    download_notice: "\n⚠️ Aviso: {} descargas simultáneas, {}s de espera entre capítulos.",
    chapter_started: "\n📥 [{}/{}] Descargando imágenes del Capítulo {}...",
    chapter_success: "✅ Capítulo {}: {} imágenes en {}",
    chapter_no_assets: "⚠️ No se descargaron imágenes para el Capítulo {}.",
    chapter_failed: "⚠️ Error al procesar el Capítulo {}: {}",
    bar_chapters: "Capítulos",
    bar_images: "Imágenes",
    summary_title: "\n--- Resumen de la descarga ---",
    summary_success: " Éxito: {} capítulos",
    summary_no_assets: " Sin imágenes: {} capítulos",
    summary_failed: " Fallo: {} capítulos",
    summary_footer: "------------------------------\n",
    continue_prompt: "¿Qué le gustaría hacer ahora?",
    search_again_option: "Buscar otro manga",
    exit_option: "Salir",
    invalid_option: "Opción no válida.",
    exiting: "Saliendo...",
    finished: "Programa finalizado.",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_replaces_placeholders_in_order() {
        assert_eq!(fill("[{}/{}] {}", &[&1, &3, &"10.5"]), "[1/3] 10.5");
        assert_eq!(fill("{} and {}", &[&"a"]), "a and {}");
        assert_eq!(fill("no placeholders", &[&1]), "no placeholders");
    }

    #[test]
    fn language_codes_round_trip() {
        for lang in LANGUAGES {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
        assert_eq!(Language::from_code("PT-BR"), Some(Language::PtBr));
        assert_eq!(Language::from_code("fr"), None);
    }

    #[test]
    fn every_table_keeps_placeholder_counts() {
        let count = |s: &str| s.matches("{}").count();
        for lang in [Language::En, Language::Es] {
            let (a, b) = (Language::PtBr.strings(), lang.strings());
            assert_eq!(count(a.chapter_started), count(b.chapter_started));
            assert_eq!(count(a.chapter_success), count(b.chapter_success));
            assert_eq!(count(a.chapter_failed), count(b.chapter_failed));
            assert_eq!(count(a.work_found), count(b.work_found));
            assert_eq!(count(a.download_notice), count(b.download_notice));
        }
    }
}
