//! Fixed Russian message texts and reply keyboards

use crate::transport::Markup;

pub const HELP: &str = "Используйте /start для того, что бы перезапустить бот";

// ========== Authorization ==========

pub const AUTH_PROMPT: &str = "Перед началом использования необходимо отправить номер телефона.\n\
Пожалуйста, нажмите на кнопку Авторизоваться ниже:";
pub const AUTH_BUTTON: &str = "🔐 Авторизоваться";
pub const AUTH_KEYWORD: &str = "Авторизоваться";
pub const CONTACT_PROMPT: &str = "Продолжая регистрацию вы соглашаетесь с политикой конфиденциальности";
pub const CONTACT_BUTTON: &str = "☎ Передать контакт";
pub const NAME_PROMPT: &str = "Введите Ваше Имя и Фамилию:";
pub const INVALID_PHONE: &str = "Вы ввели неверный номер телефона. Попробуйте еще раз:";

// ========== Competition selection ==========

pub const SELECT_PROMPT: &str = "Выберите конкурс:";
pub const SURVEY_CHOICE_BUTTON: &str = "Выиграть футболку 👕";
pub const SURVEY_CHOICE: &str = "Выиграть футболку";
pub const PUZZLE_CHOICE_BUTTON: &str = "Выиграть рюкзак/сумку 🎒";
pub const PUZZLE_CHOICE: &str = "Выиграть рюкзак/сумку";
pub const NO_CONTESTS: &str = "Активные конкурсы отсутствуют. Пока Вы можете выйграть 👕 футболку.";

// ========== Puzzle game ==========

pub const START_GAME: &str = "Начать игру";
pub const CONTINUE_GAME: &str = "Продолжить игру";
pub const NEXT_PUZZLE: &str = "Продолжить (";
pub const HINT_BUTTON: &str = "❓ Получить подсказку";
pub const HINT: &str = "Получить подсказку";
pub const END_GAME_BUTTON: &str = "✖ Закончить игру";
pub const END_GAME: &str = "Закончить игру";
pub const GAME_OVER: &str = "Игра закончена";
pub const NO_HINT: &str = "Подсказка отсутствует";
pub const PUZZLE_HELP: &str =
    "ℹ️ Отгадайте и введите слово на картинке. Если затрудняетесь, нажмите \"Получить подсказку\" ℹ️";
pub const CORRECT_ANSWER: &str = "Верный ответ. Продолжим?";
pub const WRONG_ANSWER: &str = "Ответ не верный. Попробуйте еще раз.";
pub const FRESH_INTRO: &str = "Разгадайте ребусы и получите подарок.";
pub const CONTEST_STARTED: &str = "👌 Розыгрыш рюкзака/сумки начался. Вы можете принять участие.";

pub fn partial_intro(solved: usize) -> String {
    format!(
        "Вы уже отгадали {} ребусов. Продолжите игру и получите подарок.",
        solved
    )
}

pub fn already_qualified(stand: &str) -> String {
    format!(
        "🎁 Вы уже участвуете в конкурсе. ⏰ Дождитесь результатов розыгрыша на стенде {}",
        stand
    )
}

pub fn qualified(stand: &str) -> String {
    format!(
        "Поздравляем. Подойдите на стенд {}, покажите данное сообщение и примите\n\
         участие в розыгрыше рюкзака/сумки 🎁",
        stand
    )
}

pub fn summary(solved: usize, max: usize) -> String {
    format!(
        "Спасибо за участие в игре 👏\nВы угадали {} из {} ребусов",
        solved, max
    )
}

pub fn none_left(solved: usize, max: usize) -> String {
    format!("Отсутствуют доступные ребусы.\n{}", summary(solved, max))
}

pub fn continue_button(solved: usize, max: usize) -> String {
    format!("✅ Продолжить ({} из {} успешно)", solved, max)
}

// ========== Survey ==========

pub const SURVEY_START: &str = "Опрос";
pub const SURVEY_RESTART: &str = "Пройти опрос заново";
pub const SURVEY_DECLINE: &str = "Отказаться от опроса";
pub const SURVEY_FINISH_BUTTON: &str = "✖ Завершить опрос";
pub const SURVEY_FINISH: &str = "Завершить опрос";
pub const SURVEY_REPEAT: &str = "Вы уже прошли опрос. Хотите повторить? Вторую футболку 👕 за это не дают.";

pub fn survey_intro(stand: &str) -> String {
    format!(
        "Чтобы получить 👕 футболку, нужно пройти небольшой опрос.\n\
         После прохождения подойти на стенд {} и показать сообщение о прохождении опроса.",
        stand
    )
}

pub fn survey_done(stand: &str) -> String {
    format!(
        "Спасибо за пройденный опрос. Подойдите на стенд {}, покажите данное сообщение и получите футболку 👕",
        stand
    )
}

// ========== Errors ==========

pub const CONTENT_MISSING: &str = "🚫 Не обнаружен файл с опросами или картинка ребуса!";
pub const NO_PUZZLES: &str = "🚫 Отсутствуют доступные ребусы!";

// ========== Keyboards ==========

pub fn auth_keyboard() -> Markup {
    Markup::column(&[AUTH_BUTTON])
}

pub fn contact_keyboard() -> Markup {
    Markup::RequestContact(CONTACT_BUTTON.to_string())
}

pub fn select_keyboard() -> Markup {
    Markup::column(&[SURVEY_CHOICE_BUTTON, PUZZLE_CHOICE_BUTTON])
}

pub fn puzzle_keyboard() -> Markup {
    Markup::column(&[HINT_BUTTON, END_GAME_BUTTON])
}

pub fn continue_keyboard(solved: usize, max: usize) -> Markup {
    Markup::column(&[continue_button(solved, max), END_GAME_BUTTON.to_string()])
}

pub fn game_over_keyboard() -> Markup {
    Markup::column(&[GAME_OVER])
}

pub fn survey_start_keyboard(finished_before: bool) -> Markup {
    if finished_before {
        Markup::column(&[SURVEY_RESTART, SURVEY_DECLINE])
    } else {
        Markup::column(&[SURVEY_START])
    }
}

pub fn survey_finish_keyboard() -> Markup {
    Markup::column(&[SURVEY_FINISH_BUTTON])
}
