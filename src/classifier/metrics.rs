use ndarray::prelude::*;

/// Label-indexed confusion matrix: rows are true classes, columns predicted
/// classes.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], num_labels: usize) -> Array2<f32> {
    let mut matrix = Array2::<f32>::zeros((num_labels, num_labels));
    for (truth, prediction) in y_true.iter().zip(y_pred.iter()) {
        if *truth < num_labels && *prediction < num_labels {
            matrix[[*truth, *prediction]] += 1.0;
        }
    }
    matrix
}

/// Text classification report: per-class precision/recall/f1/support plus
/// accuracy, macro and weighted averages. `classes` pairs each class index
/// with its display name, in the order the rows should appear.
pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    classes: &[(usize, String)],
) -> String {
    let name_width = classes
        .iter()
        .map(|(_, name)| name.len())
        .chain(Some("weighted avg".len()))
        .max()
        .unwrap_or(0);

    let mut lines = Vec::new();
    lines.push(format!(
        "{:>width$}  {:>9}  {:>9}  {:>9}  {:>9}",
        "",
        "precision",
        "recall",
        "f1-score",
        "support",
        width = name_width
    ));
    lines.push(String::new());

    let total = y_true.len();
    let mut macro_precision = 0.0;
    let mut macro_recall = 0.0;
    let mut macro_f1 = 0.0;
    let mut weighted_precision = 0.0;
    let mut weighted_recall = 0.0;
    let mut weighted_f1 = 0.0;

    for (index, name) in classes {
        let support = y_true.iter().filter(|t| *t == index).count();
        let predicted = y_pred.iter().filter(|p| *p == index).count();
        let true_positives = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| *t == index && *p == index)
            .count();
        let precision = ratio(true_positives, predicted);
        let recall = ratio(true_positives, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        macro_precision += precision;
        macro_recall += recall;
        macro_f1 += f1;
        weighted_precision += precision * support as f32;
        weighted_recall += recall * support as f32;
        weighted_f1 += f1 * support as f32;
        lines.push(format!(
            "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
            name,
            precision,
            recall,
            f1,
            support,
            width = name_width
        ));
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    let accuracy = ratio(correct, total);
    let num_classes = classes.len().max(1) as f32;
    let total_f = total.max(1) as f32;

    lines.push(String::new());
    lines.push(format!(
        "{:>width$}  {:>9}  {:>9}  {:>9.2}  {:>9}",
        "accuracy",
        "",
        "",
        accuracy,
        total,
        width = name_width
    ));
    lines.push(format!(
        "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
        "macro avg",
        macro_precision / num_classes,
        macro_recall / num_classes,
        macro_f1 / num_classes,
        total,
        width = name_width
    ));
    lines.push(format!(
        "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
        "weighted avg",
        weighted_precision / total_f,
        weighted_recall / total_f,
        weighted_f1 / total_f,
        total,
        width = name_width
    ));
    lines.join("\n")
}

fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_matrix_counts_true_rows_predicted_columns() {
        // Given
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![0, 1, 1, 1];

        // When
        let matrix = confusion_matrix(&y_true, &y_pred, 2);

        // Then
        assert_eq!((2, 2), matrix.dim());
        assert_eq!(1.0, matrix[[0, 0]]);
        assert_eq!(1.0, matrix[[0, 1]]);
        assert_eq!(0.0, matrix[[1, 0]]);
        assert_eq!(2.0, matrix[[1, 1]]);
        assert_eq!(y_true.len() as f32, matrix.sum());
    }

    #[test]
    fn report_lists_classes_in_caller_order() {
        // Given
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![0, 1, 1, 1];
        let classes = vec![
            (1, "table_locked".to_string()),
            (0, "email_invalid".to_string()),
        ];

        // When
        let report = classification_report(&y_true, &y_pred, &classes);

        // Then
        let table_line_ix = report
            .lines()
            .position(|line| line.contains("table_locked"))
            .unwrap();
        let email_line_ix = report
            .lines()
            .position(|line| line.contains("email_invalid"))
            .unwrap();
        assert!(table_line_ix < email_line_ix);
        assert!(report.contains("accuracy"));
        assert!(report.contains("weighted avg"));
    }
}
